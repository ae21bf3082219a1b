//! Code Generation Host Settings
//!
//! [`HostConfig`] describes the class a template compiles into and how code
//! is generated for it. [`GeneratedCodeContext`] names the runtime members
//! that generated code calls.

use serde::{Deserialize, Serialize};

/// Default namespace of generated classes
pub const DEFAULT_NAMESPACE: &str = "Razor";

/// Default name of generated classes
pub const DEFAULT_CLASS_NAME: &str = "Template";

/// Default base class of generated classes
pub const DEFAULT_BASE_CLASS: &str = "TemplateBase";

/// Names of the runtime members generated code refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCodeContext {
    /// Method holding the body of the template
    pub execute_method: String,
    /// Writes an expression value
    pub write_method: String,
    /// Writes literal markup
    pub write_literal_method: String,
    /// Writes an expression value to a given writer
    pub write_to_method: String,
    /// Writes literal markup to a given writer
    pub write_literal_to_method: String,
    /// Registers a named section
    pub define_section_method: String,
    /// Type returned by helpers and inline templates
    pub template_type_name: String,
    /// Property receiving the layout page
    pub layout_property: String,
    /// Writer parameter of inline templates
    pub template_writer_name: String,
    /// Writer parameter of helpers
    pub helper_writer_name: String,
}

impl Default for GeneratedCodeContext {
    fn default() -> Self {
        Self {
            execute_method: "Execute".to_string(),
            write_method: "Write".to_string(),
            write_literal_method: "WriteLiteral".to_string(),
            write_to_method: "WriteTo".to_string(),
            write_literal_to_method: "WriteLiteralTo".to_string(),
            define_section_method: "DefineSection".to_string(),
            template_type_name: "HelperResult".to_string(),
            layout_property: "Layout".to_string(),
            template_writer_name: "__razor_template_writer".to_string(),
            helper_writer_name: "__razor_helper_writer".to_string(),
        }
    }
}

/// Settings for generating code from one template
///
/// # Example
///
/// ```
/// use razorblade::HostConfig;
///
/// let host = HostConfig::new()
///     .with_namespace("Views")
///     .with_class_name("Index")
///     .with_file_name("Index.cshtml")
///     .with_design_time(true);
/// assert!(host.design_time);
/// assert_eq!(host.file_name.as_deref(), Some("Index.cshtml"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Namespace of the generated class
    pub namespace: String,
    /// Name of the generated class
    pub class_name: String,
    /// Base class, before any model type is applied
    pub base_class: String,
    /// Namespaces imported into every generated file
    pub default_imports: Vec<String>,
    /// Generate code for editor tooling instead of execution
    pub design_time: bool,
    /// Wrap user code in line pragmas pointing back at the template
    pub generate_line_pragmas: bool,
    /// Template file name used in line pragmas
    pub file_name: Option<String>,
    /// Runtime member names
    pub context: GeneratedCodeContext,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            class_name: DEFAULT_CLASS_NAME.to_string(),
            base_class: DEFAULT_BASE_CLASS.to_string(),
            default_imports: vec![
                "System".to_string(),
                "System.Collections.Generic".to_string(),
                "System.Linq".to_string(),
            ],
            design_time: false,
            generate_line_pragmas: true,
            file_name: None,
            context: GeneratedCodeContext::default(),
        }
    }
}

impl HostConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn with_base_class(mut self, base_class: impl Into<String>) -> Self {
        self.base_class = base_class.into();
        self
    }

    /// Replace the default imports
    pub fn with_default_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_imports = imports.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_design_time(mut self, design_time: bool) -> Self {
        self.design_time = design_time;
        self
    }

    pub fn with_line_pragmas(mut self, enabled: bool) -> Self {
        self.generate_line_pragmas = enabled;
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_context(mut self, context: GeneratedCodeContext) -> Self {
        self.context = context;
        self
    }

    /// File name to use in line pragmas, when pragmas are enabled
    pub fn pragma_file(&self) -> Option<&str> {
        if self.generate_line_pragmas {
            self.file_name.as_deref()
        } else {
            None
        }
    }
}
