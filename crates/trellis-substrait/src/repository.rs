//! Function repository: scalar-function implementations loaded from
//! Substrait simple-extension YAML files, resolved by `(uri, name, argument
//! types)`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::types::Type;

/// Canonical location of the standard extension files; these are also
/// embedded in the crate so no network access is needed to use them.
pub const DEFAULT_EXTENSIONS_DIR: &str =
    "https://github.com/substrait-io/substrait/blob/main/extensions/";

pub const FUNCTIONS_ARITHMETIC_URI: &str =
    "https://github.com/substrait-io/substrait/blob/main/extensions/functions_arithmetic.yaml";
pub const FUNCTIONS_BOOLEAN_URI: &str =
    "https://github.com/substrait-io/substrait/blob/main/extensions/functions_boolean.yaml";
pub const FUNCTIONS_COMPARISON_URI: &str =
    "https://github.com/substrait-io/substrait/blob/main/extensions/functions_comparison.yaml";

#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("function: no implementation matching the provided arguments")]
    NoMatchingImplementation,

    #[error("provided arguments do not match the signature {signature}: [{args}]")]
    SignatureMismatch { signature: String, args: String },

    #[error("invalid function signature: {0}")]
    InvalidSignature(String),

    #[error("unrecognized type name in extension file: {0}")]
    UnrecognizedTypeName(String),

    #[error("invalid extension URI, expected YAML file, found: {0}")]
    InvalidExtensionUri(String),

    #[error("unrecognized scheme: {0}")]
    UnrecognizedScheme(String),

    #[error("invalid github uri: {0}")]
    InvalidGithubUri(String),

    #[error("no embedded extension file: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl FunctionError {
    /// Mismatches mean "try the next candidate"; anything else is fatal.
    fn is_signature_mismatch(&self) -> bool {
        matches!(self, FunctionError::SignatureMismatch { .. })
    }
}

/// One typed overload of a named scalar function.
pub trait FunctionImplementation: Send + Sync {
    fn name(&self) -> &str;

    /// The compound signature, e.g. `add:i64_i64`.
    fn signature(&self) -> String;

    fn return_type(&self, args: &[Type]) -> Result<Type, FunctionError>;
}

/// Resolves function implementations by URI, name, and argument types.
pub trait FunctionRepository: Send + Sync {
    fn get_implementation(
        &self,
        uri: &str,
        name: &str,
        args: &[Type],
    ) -> Result<Arc<dyn FunctionImplementation>, FunctionError>;
}

/// A repository of implementations registered per `(uri, name)`, in
/// registration order.
#[derive(Default)]
pub struct ExtensionRepository {
    definitions: HashMap<String, HashMap<String, Vec<Arc<dyn FunctionImplementation>>>>,
}

impl ExtensionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_implementation(
        &mut self,
        uri: &str,
        name: &str,
        implementation: Arc<dyn FunctionImplementation>,
    ) {
        self.definitions
            .entry(uri.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .push(implementation);
    }

    /// Loads a simple-extension YAML file and registers every scalar-function
    /// variant it declares under the given URI.
    pub fn register_from_uri(&mut self, uri: &str) -> Result<(), FunctionError> {
        let contents = fetch_extension_file(uri)?;
        let file: SimpleExtensionFile = serde_yaml::from_str(&contents)?;

        let mut count = 0usize;
        for function in &file.scalar_functions {
            for variant in function.variants()? {
                self.register_implementation(uri, &function.name, Arc::new(variant));
                count += 1;
            }
        }

        debug!(uri, variants = count, "registered scalar function variants");
        Ok(())
    }

    pub fn functions_for_uri(&self, uri: &str) -> Vec<&str> {
        self.definitions
            .get(uri)
            .map(|functions| functions.keys().map(|name| name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn implementations(&self, uri: &str, name: &str) -> &[Arc<dyn FunctionImplementation>] {
        self.definitions
            .get(uri)
            .and_then(|functions| functions.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl FunctionRepository for ExtensionRepository {
    fn get_implementation(
        &self,
        uri: &str,
        name: &str,
        args: &[Type],
    ) -> Result<Arc<dyn FunctionImplementation>, FunctionError> {
        for implementation in self.implementations(uri, name) {
            match implementation.return_type(args) {
                Ok(_) => return Ok(implementation.clone()),
                Err(err) if err.is_signature_mismatch() => continue,
                Err(err) => return Err(err),
            }
        }

        Err(FunctionError::NoMatchingImplementation)
    }
}

impl fmt::Debug for ExtensionRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRepository")
            .field("uris", &self.definitions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The process-wide repository holding the embedded standard extensions.
/// Built once on first use and read-only afterwards.
static DEFAULT_REPOSITORY: LazyLock<Arc<ExtensionRepository>> = LazyLock::new(|| {
    let mut repository = ExtensionRepository::new();
    for uri in [
        FUNCTIONS_ARITHMETIC_URI,
        FUNCTIONS_BOOLEAN_URI,
        FUNCTIONS_COMPARISON_URI,
    ] {
        repository
            .register_from_uri(uri)
            .expect("embedded extension files load");
    }
    Arc::new(repository)
});

pub fn default_repository() -> Arc<ExtensionRepository> {
    DEFAULT_REPOSITORY.clone()
}

/// One overload loaded from an extension file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarFunctionVariant {
    name: String,
    args: Vec<Type>,
    return_type: Type,
}

impl ScalarFunctionVariant {
    pub fn new(name: impl Into<String>, args: Vec<Type>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            args,
            return_type,
        }
    }
}

impl FunctionImplementation for ScalarFunctionVariant {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> String {
        let args: Vec<&str> = self.args.iter().map(|t| t.signature_name()).collect();
        format!("{}:{}", self.name, args.join("_"))
    }

    fn return_type(&self, args: &[Type]) -> Result<Type, FunctionError> {
        let mismatch = || FunctionError::SignatureMismatch {
            signature: self.signature(),
            args: args
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        };

        if args.len() != self.args.len() {
            return Err(mismatch());
        }
        // Nullability is not part of overload selection.
        for (declared, actual) in self.args.iter().zip(args) {
            if declared.kind() != actual.kind() {
                return Err(mismatch());
            }
        }

        Ok(self.return_type.clone())
    }
}

/// A repository that always answers with one pre-supplied implementation.
/// Used during deserialization, where the plan itself carries the output
/// type and no extension YAML is available.
pub struct AnonymousRepository {
    implementation: Arc<AnonymousFunctionImplementation>,
}

impl AnonymousRepository {
    pub fn new(signature: &str, return_type: Type) -> Result<Self, FunctionError> {
        let Some((name, _)) = signature.split_once(':') else {
            return Err(FunctionError::InvalidSignature(signature.to_string()));
        };

        Ok(Self {
            implementation: Arc::new(AnonymousFunctionImplementation {
                name: name.to_string(),
                signature: signature.to_string(),
                return_type,
            }),
        })
    }

    pub fn function_name(&self) -> &str {
        &self.implementation.name
    }
}

impl FunctionRepository for AnonymousRepository {
    fn get_implementation(
        &self,
        _uri: &str,
        _name: &str,
        _args: &[Type],
    ) -> Result<Arc<dyn FunctionImplementation>, FunctionError> {
        Ok(self.implementation.clone())
    }
}

struct AnonymousFunctionImplementation {
    name: String,
    signature: String,
    return_type: Type,
}

impl FunctionImplementation for AnonymousFunctionImplementation {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> String {
        self.signature.clone()
    }

    fn return_type(&self, _args: &[Type]) -> Result<Type, FunctionError> {
        Ok(self.return_type.clone())
    }
}

/// Simple-extension file model, limited to the scalar-function section.
#[derive(Debug, Deserialize)]
pub struct SimpleExtensionFile {
    #[serde(default)]
    pub scalar_functions: Vec<ScalarFunctionDef>,
}

#[derive(Debug, Deserialize)]
pub struct ScalarFunctionDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub impls: Vec<VariantDef>,
}

impl ScalarFunctionDef {
    /// Expands the declaration into one variant per overload.
    pub fn variants(&self) -> Result<Vec<ScalarFunctionVariant>, FunctionError> {
        self.impls
            .iter()
            .map(|def| {
                let args = def
                    .args
                    .iter()
                    .map(|arg| {
                        Type::parse(&arg.value)
                            .ok_or_else(|| FunctionError::UnrecognizedTypeName(arg.value.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let return_type = Type::parse(&def.return_type).ok_or_else(|| {
                    FunctionError::UnrecognizedTypeName(def.return_type.clone())
                })?;

                Ok(ScalarFunctionVariant::new(&self.name, args, return_type))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct VariantDef {
    #[serde(default)]
    pub args: Vec<ArgumentDef>,
    #[serde(rename = "return")]
    pub return_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ArgumentDef {
    #[serde(default)]
    pub name: String,
    pub value: String,
}

/// Fetches the bytes of an extension file: embedded for the canonical
/// extensions directory, local filesystem for `file`, network for `http(s)`.
fn fetch_extension_file(uri: &str) -> Result<String, FunctionError> {
    if !uri.ends_with(".yaml") {
        return Err(FunctionError::InvalidExtensionUri(uri.to_string()));
    }

    if let Some(base) = uri.strip_prefix(DEFAULT_EXTENSIONS_DIR) {
        return embedded_extension_file(base);
    }

    let Some((scheme, rest)) = uri.split_once("://") else {
        return Err(FunctionError::UnrecognizedScheme(uri.to_string()));
    };

    match scheme {
        "file" => Ok(std::fs::read_to_string(rest)?),
        "http" | "https" => Ok(reqwest::blocking::get(uri)?.error_for_status()?.text()?),
        _ => Err(FunctionError::UnrecognizedScheme(scheme.to_string())),
    }
}

fn embedded_extension_file(name: &str) -> Result<String, FunctionError> {
    let contents = match name {
        "functions_arithmetic.yaml" => include_str!("../extensions/functions_arithmetic.yaml"),
        "functions_boolean.yaml" => include_str!("../extensions/functions_boolean.yaml"),
        "functions_comparison.yaml" => include_str!("../extensions/functions_comparison.yaml"),
        _ => return Err(FunctionError::NotFound(name.to_string())),
    };
    Ok(contents.to_string())
}

/// Rewrites a github blob URL to the raw content host.
pub fn raw_file_from_github_url(url: &str) -> Result<String, FunctionError> {
    let invalid = || FunctionError::InvalidGithubUri(url.to_string());

    let body = url.strip_prefix("https://github.com/").ok_or_else(invalid)?;

    let parts: Vec<&str> = body.splitn(5, '/').collect();
    let [user, repo, blob, branch, filename] = parts.as_slice() else {
        return Err(invalid());
    };
    if *blob != "blob" {
        return Err(invalid());
    }

    Ok(format!(
        "https://raw.githubusercontent.com/{user}/{repo}/{branch}/{filename}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AddI64;

    impl FunctionImplementation for AddI64 {
        fn name(&self) -> &str {
            "add"
        }

        fn signature(&self) -> String {
            "add:i64_i64".to_string()
        }

        fn return_type(&self, args: &[Type]) -> Result<Type, FunctionError> {
            let expected = Type::int64(false);
            if args.len() != 2 || args.iter().any(|arg| *arg != expected) {
                return Err(FunctionError::SignatureMismatch {
                    signature: self.signature(),
                    args: args
                        .iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            Ok(expected)
        }
    }

    #[test]
    fn resolution_by_argument_types() {
        let mut repo = ExtensionRepository::new();
        let uri = "https://example.com/functions.yaml";
        repo.register_implementation(uri, "add", Arc::new(AddI64));

        let args = [Type::int64(false), Type::int64(false)];
        let implementation = repo.get_implementation(uri, "add", &args).unwrap();
        assert_eq!(implementation.signature(), "add:i64_i64");
        assert_eq!(implementation.return_type(&args).unwrap(), Type::int64(false));

        // Function name not known.
        assert!(matches!(
            repo.get_implementation(uri, "sub", &[]),
            Err(FunctionError::NoMatchingImplementation)
        ));

        // No valid signature with one argument.
        assert!(repo
            .get_implementation(uri, "add", &[Type::int64(false)])
            .is_err());

        // No valid signature with arguments i64_i8.
        assert!(repo
            .get_implementation(uri, "add", &[Type::int64(false), Type::int8(false)])
            .is_err());
    }

    #[test]
    fn registration_order_decides_ties() {
        let mut repo = ExtensionRepository::new();
        let uri = "https://example.com/functions.yaml";
        let first = ScalarFunctionVariant::new(
            "add",
            vec![Type::int64(false), Type::int64(false)],
            Type::int64(false),
        );
        let second = ScalarFunctionVariant::new(
            "add",
            vec![Type::int64(true), Type::int64(true)],
            Type::int64(true),
        );
        repo.register_implementation(uri, "add", Arc::new(first));
        repo.register_implementation(uri, "add", Arc::new(second));

        // Nullability is ignored per-slot, so the first registered overload wins.
        let args = [Type::int64(true), Type::int64(true)];
        let implementation = repo.get_implementation(uri, "add", &args).unwrap();
        assert_eq!(implementation.return_type(&args).unwrap(), Type::int64(false));
    }

    #[test]
    fn variants_parse_from_yaml() {
        let yaml = r#"
scalar_functions:
  - name: "add"
    description: "Add two values."
    impls:
      - args:
          - name: x
            value: i8
          - name: y
            value: i8
        return: i8
      - args:
          - name: x
            value: i64
          - name: y
            value: i64
        return: i64
"#;
        let file: SimpleExtensionFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.scalar_functions.len(), 1);

        let variants = file.scalar_functions[0].variants().unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].signature(), "add:i8_i8");
        assert_eq!(variants[1].signature(), "add:i64_i64");

        let ret = variants[1]
            .return_type(&[Type::int64(false), Type::int64(false)])
            .unwrap();
        assert_eq!(ret, Type::int64(false));
        assert!(!ret.nullable());
    }

    #[test]
    fn default_extensions_are_embedded() {
        let mut repo = ExtensionRepository::new();
        repo.register_from_uri(FUNCTIONS_ARITHMETIC_URI).unwrap();

        let args = [Type::int64(false), Type::int64(false)];
        let implementation = repo
            .get_implementation(FUNCTIONS_ARITHMETIC_URI, "add", &args)
            .unwrap();
        assert_eq!(implementation.signature(), "add:i64_i64");

        let mut functions = repo.functions_for_uri(FUNCTIONS_ARITHMETIC_URI);
        functions.sort_unstable();
        assert_eq!(
            functions,
            vec!["add", "divide", "modulus", "multiply", "subtract"]
        );
    }

    #[test]
    fn default_repository_covers_operator_functions() {
        let repo = default_repository();
        let int_args = [Type::int64(false), Type::int64(false)];
        let bool_args = [Type::boolean(false), Type::boolean(false)];

        assert!(repo
            .get_implementation(FUNCTIONS_ARITHMETIC_URI, "add", &int_args)
            .is_ok());
        assert!(repo
            .get_implementation(FUNCTIONS_COMPARISON_URI, "equal", &int_args)
            .is_ok());
        assert!(repo
            .get_implementation(FUNCTIONS_BOOLEAN_URI, "and", &bool_args)
            .is_ok());
    }

    #[test]
    fn anonymous_repository_answers_with_fixed_implementation() {
        let repo = AnonymousRepository::new("add:i64_i64", Type::int64(false)).unwrap();
        assert_eq!(repo.function_name(), "add");

        let implementation = repo.get_implementation("ignored", "ignored", &[]).unwrap();
        assert_eq!(implementation.signature(), "add:i64_i64");
        assert_eq!(implementation.return_type(&[]).unwrap(), Type::int64(false));

        assert!(matches!(
            AnonymousRepository::new("missing-separator", Type::int64(false)),
            Err(FunctionError::InvalidSignature(_))
        ));
    }

    #[test]
    fn extension_uri_must_be_yaml() {
        let mut repo = ExtensionRepository::new();
        assert!(matches!(
            repo.register_from_uri("https://example.com/functions.json"),
            Err(FunctionError::InvalidExtensionUri(_))
        ));
        assert!(matches!(
            repo.register_from_uri("ftp://example.com/functions.yaml"),
            Err(FunctionError::UnrecognizedScheme(_))
        ));
    }

    #[test]
    fn github_raw_url_rewrite() {
        let raw = raw_file_from_github_url(
            "https://github.com/substrait-io/substrait/blob/main/extensions/functions_arithmetic.yaml",
        )
        .unwrap();
        assert_eq!(
            raw,
            "https://raw.githubusercontent.com/substrait-io/substrait/main/extensions/functions_arithmetic.yaml"
        );

        assert!(raw_file_from_github_url("https://example.com/whatever.yaml").is_err());
        assert!(raw_file_from_github_url("https://github.com/substrait-io/substrait/tree/main").is_err());
    }
}
