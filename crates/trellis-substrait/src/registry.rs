//! Extension registry: assigns plan-local anchors to `(uri, function
//! signature)` pairs during serialization and rebuilds them when decoding.

use substrait::proto;
use substrait::proto::extensions::simple_extension_declaration::{
    ExtensionFunction, MappingType,
};
use substrait::proto::extensions::{SimpleExtensionDeclaration, SimpleExtensionUri};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid extension reference: {0}")]
    InvalidReference(u32),

    #[error("unable to resolve extension URI reference: {0}")]
    UnresolvedUriReference(u32),

    #[error("cannot register {kind} {uri}/{name}: unimplemented")]
    UnsupportedExtensionKind {
        kind: &'static str,
        uri: String,
        name: String,
    },

    #[error("serialization unimplemented: extension kind {0:?}")]
    UnsupportedKind(ExtensionKind),

    #[error("invalid extension declaration: missing mapping type")]
    MissingMappingType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Type,
    TypeVariation,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Extension {
    uri: String,
    name: String,
    kind: ExtensionKind,
}

/// A unique URI with its anchor, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionUri {
    pub uri: String,
    pub anchor: u32,
}

/// One extension declaration: the URI it references, its own anchor, and the
/// function signature it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionDeclaration {
    pub reference: u32,
    pub anchor: u32,
    pub name: String,
    pub kind: ExtensionKind,
}

/// Registered extensions are append-only; an anchor never changes for the
/// lifetime of the plan. URI anchors and function anchors are independent
/// sequences, both starting at 1.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Extension>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the anchor for the pair, registering it first if needed.
    pub fn register_function(&mut self, uri: &str, signature: &str) -> u32 {
        if let Some(index) = self
            .extensions
            .iter()
            .position(|e| e.uri == uri && e.name == signature)
        {
            return (index + 1) as u32;
        }

        self.extensions.push(Extension {
            uri: uri.to_string(),
            name: signature.to_string(),
            kind: ExtensionKind::Function,
        });
        self.extensions.len() as u32
    }

    /// The unique URIs (first-seen order) and per-function declarations.
    pub fn extensions(&self) -> (Vec<ExtensionUri>, Vec<ExtensionDeclaration>) {
        let mut uris: Vec<ExtensionUri> = Vec::new();
        let mut declarations = Vec::with_capacity(self.extensions.len());

        let mut next_uri_anchor: u32 = 1;
        for (i, ext) in self.extensions.iter().enumerate() {
            let reference = match uris.iter().find(|u| u.uri == ext.uri) {
                Some(existing) => existing.anchor,
                None => {
                    let anchor = next_uri_anchor;
                    uris.push(ExtensionUri {
                        uri: ext.uri.clone(),
                        anchor,
                    });
                    next_uri_anchor += 1;
                    anchor
                }
            };

            declarations.push(ExtensionDeclaration {
                reference,
                anchor: (i + 1) as u32,
                name: ext.name.clone(),
                kind: ext.kind,
            });
        }

        (uris, declarations)
    }

    /// Looks up a declaration and its URI by function anchor.
    pub fn get_by_anchor(
        &self,
        reference: u32,
    ) -> Result<(ExtensionDeclaration, String), RegistryError> {
        if reference == 0 || reference as usize > self.extensions.len() {
            return Err(RegistryError::InvalidReference(reference));
        }

        let (uris, declarations) = self.extensions();
        // Declarations are kept in order but indexed starting from 1.
        let declaration = declarations[(reference - 1) as usize].clone();
        let uri = uris
            .iter()
            .find(|u| u.anchor == declaration.reference)
            .ok_or(RegistryError::UnresolvedUriReference(declaration.reference))?
            .uri
            .clone();

        Ok((declaration, uri))
    }

    pub fn to_proto(
        &self,
    ) -> Result<(Vec<SimpleExtensionUri>, Vec<SimpleExtensionDeclaration>), RegistryError> {
        let (uris, declarations) = self.extensions();

        let proto_uris = uris
            .into_iter()
            .map(|uri| SimpleExtensionUri {
                extension_uri_anchor: uri.anchor,
                uri: uri.uri,
            })
            .collect();

        let proto_extensions = declarations
            .into_iter()
            .map(|decl| {
                if decl.kind != ExtensionKind::Function {
                    return Err(RegistryError::UnsupportedKind(decl.kind));
                }
                Ok(SimpleExtensionDeclaration {
                    mapping_type: Some(MappingType::ExtensionFunction(ExtensionFunction {
                        extension_uri_reference: decl.reference,
                        function_anchor: decl.anchor,
                        name: decl.name,
                        ..Default::default()
                    })),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((proto_uris, proto_extensions))
    }

    /// Rebuilds the registry from a plan's extension tables.
    pub fn from_proto(plan: &proto::Plan) -> Result<Self, RegistryError> {
        let mut registry = Self::default();

        let uri_by_ref: std::collections::HashMap<u32, &str> = plan
            .extension_uris
            .iter()
            .map(|uri| (uri.extension_uri_anchor, uri.uri.as_str()))
            .collect();

        for ext in &plan.extensions {
            match &ext.mapping_type {
                Some(MappingType::ExtensionFunction(function)) => {
                    let uri = uri_by_ref
                        .get(&function.extension_uri_reference)
                        .ok_or(RegistryError::UnresolvedUriReference(
                            function.extension_uri_reference,
                        ))?;
                    registry.register_function(uri, &function.name);
                }
                Some(MappingType::ExtensionType(typ)) => {
                    let uri = uri_by_ref
                        .get(&typ.extension_uri_reference)
                        .ok_or(RegistryError::UnresolvedUriReference(
                            typ.extension_uri_reference,
                        ))?;
                    return Err(RegistryError::UnsupportedExtensionKind {
                        kind: "ExtensionType",
                        uri: uri.to_string(),
                        name: typ.name.clone(),
                    });
                }
                Some(MappingType::ExtensionTypeVariation(variation)) => {
                    let uri = uri_by_ref
                        .get(&variation.extension_uri_reference)
                        .ok_or(RegistryError::UnresolvedUriReference(
                            variation.extension_uri_reference,
                        ))?;
                    return Err(RegistryError::UnsupportedExtensionKind {
                        kind: "ExtensionTypeVariation",
                        uri: uri.to_string(),
                        name: variation.name.clone(),
                    });
                }
                None => return Err(RegistryError::MissingMappingType),
            }
        }

        Ok(registry)
    }
}
