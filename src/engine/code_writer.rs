//! Target Language Fragments
//!
//! A [`CodeWriter`] knows the surface syntax of one target language. The
//! code generator decides *what* to emit; the writer decides how it is
//! spelled. Fragments never carry indentation or a trailing newline.

use super::dialect::TargetLanguage;
use super::host::GeneratedCodeContext;

/// Spelling of generated constructs in one target language
pub trait CodeWriter: Send + Sync {
    /// The language written
    fn language(&self) -> TargetLanguage;

    /// `text` as a string literal
    fn string_literal(&self, text: &str) -> String;

    /// Terminator appended to a statement
    fn statement_end(&self) -> &'static str;

    /// `method(args)` as a statement
    fn call(&self, method: &str, args: &[&str]) -> String {
        format!("{}({}){}", method, args.join(", "), self.statement_end())
    }

    /// Start of a block of code mapped to `line` (zero based) of `file`
    fn line_pragma_start(&self, line: usize, file: &str) -> String;

    /// End of a mapped block of code
    fn line_pragma_end(&self) -> String;

    /// `using`-style import of `namespace`
    fn import(&self, namespace: &str) -> String;

    fn namespace_start(&self, namespace: &str) -> String;
    fn namespace_end(&self) -> String;

    /// Class declaration deriving from `base`
    fn class_start(&self, class_name: &str, base: &str) -> String;
    fn class_end(&self) -> String;

    /// `base` instantiated with `model`
    fn generic_base(&self, base: &str, model: &str) -> String;

    fn execute_start(&self, context: &GeneratedCodeContext) -> String;
    fn execute_end(&self) -> String;

    /// Field receiving design-time expression values
    fn design_time_field(&self) -> String;
    fn design_time_helper_start(&self) -> String;
    fn design_time_helper_end(&self) -> String;

    /// Text written before a design-time expression
    fn design_time_assignment(&self) -> &'static str;

    /// Local declaration naming a type so tooling can resolve it
    ///
    /// Returns the text before and after the type name.
    fn type_placeholder(&self, variable: &str) -> (String, String);

    /// `property = "value"`
    fn property_assignment(&self, property: &str, value: &str) -> String {
        format!(
            "{} = {}{}",
            property,
            self.string_literal(value),
            self.statement_end()
        )
    }

    fn section_start(&self, context: &GeneratedCodeContext, name: &str) -> String;
    fn section_end(&self) -> String;

    fn template_start(&self, context: &GeneratedCodeContext) -> String;
    fn template_end(&self) -> String;

    fn helper_start(&self, context: &GeneratedCodeContext, header: &str) -> String;
    fn helper_end(&self) -> String;
}

/// Writer for the given target language
pub fn writer_for(language: TargetLanguage) -> Box<dyn CodeWriter> {
    match language {
        TargetLanguage::CSharp => Box::new(CSharpWriter),
        TargetLanguage::Basic => Box::new(BasicWriter),
    }
}

// ============================================================================
// C-family
// ============================================================================

/// Writer for C-family output
#[derive(Debug, Clone, Copy, Default)]
pub struct CSharpWriter;

impl CodeWriter for CSharpWriter {
    fn language(&self) -> TargetLanguage {
        TargetLanguage::CSharp
    }

    fn string_literal(&self, text: &str) -> String {
        let mut literal = String::with_capacity(text.len() + 2);
        literal.push('"');
        for ch in text.chars() {
            match ch {
                '"' => literal.push_str("\\\""),
                '\\' => literal.push_str("\\\\"),
                '\r' => literal.push_str("\\r"),
                '\n' => literal.push_str("\\n"),
                '\t' => literal.push_str("\\t"),
                '\0' => literal.push_str("\\0"),
                '\u{2028}' => literal.push_str("\\u2028"),
                '\u{2029}' => literal.push_str("\\u2029"),
                _ => literal.push(ch),
            }
        }
        literal.push('"');
        literal
    }

    fn statement_end(&self) -> &'static str {
        ";"
    }

    fn line_pragma_start(&self, line: usize, file: &str) -> String {
        format!("#line {} {}", line + 1, self.string_literal(file))
    }

    fn line_pragma_end(&self) -> String {
        "#line default\n#line hidden".to_string()
    }

    fn import(&self, namespace: &str) -> String {
        format!("using {};", namespace)
    }

    fn namespace_start(&self, namespace: &str) -> String {
        format!("namespace {} {{", namespace)
    }

    fn namespace_end(&self) -> String {
        "}".to_string()
    }

    fn class_start(&self, class_name: &str, base: &str) -> String {
        format!("public class {} : {} {{", class_name, base)
    }

    fn class_end(&self) -> String {
        "}".to_string()
    }

    fn generic_base(&self, base: &str, model: &str) -> String {
        format!("{}<{}>", base, model)
    }

    fn execute_start(&self, context: &GeneratedCodeContext) -> String {
        format!("public override void {}() {{", context.execute_method)
    }

    fn execute_end(&self) -> String {
        "}".to_string()
    }

    fn design_time_field(&self) -> String {
        "private static object @__o;".to_string()
    }

    fn design_time_helper_start(&self) -> String {
        "private void @__RazorDesignTimeHelpers__() {\n#pragma warning disable 219".to_string()
    }

    fn design_time_helper_end(&self) -> String {
        "#pragma warning restore 219\n}".to_string()
    }

    fn design_time_assignment(&self) -> &'static str {
        "__o = "
    }

    fn type_placeholder(&self, variable: &str) -> (String, String) {
        (String::new(), format!(" {} = null;", variable))
    }

    fn section_start(&self, context: &GeneratedCodeContext, name: &str) -> String {
        format!(
            "{}({}, () => {{",
            context.define_section_method,
            self.string_literal(name)
        )
    }

    fn section_end(&self) -> String {
        "});".to_string()
    }

    fn template_start(&self, context: &GeneratedCodeContext) -> String {
        format!(
            "item => new {}({} => {{",
            context.template_type_name, context.template_writer_name
        )
    }

    fn template_end(&self) -> String {
        "})".to_string()
    }

    fn helper_start(&self, context: &GeneratedCodeContext, header: &str) -> String {
        format!(
            "public static {} {} {{\nreturn new {}({} => {{",
            context.template_type_name,
            header,
            context.template_type_name,
            context.helper_writer_name
        )
    }

    fn helper_end(&self) -> String {
        "});\n}".to_string()
    }
}

// ============================================================================
// Basic-family
// ============================================================================

/// Writer for Basic-family output
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicWriter;

impl CodeWriter for BasicWriter {
    fn language(&self) -> TargetLanguage {
        TargetLanguage::Basic
    }

    fn string_literal(&self, text: &str) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut current = String::new();
        for ch in text.chars() {
            match ch {
                '"' => current.push_str("\"\""),
                '\r' | '\n' | '\t' => {
                    if !current.is_empty() {
                        parts.push(format!("\"{}\"", current));
                        current.clear();
                    }
                    parts.push(format!("ChrW({})", ch as u32));
                }
                _ => current.push(ch),
            }
        }
        if !current.is_empty() || parts.is_empty() {
            parts.push(format!("\"{}\"", current));
        }
        parts.join(" & ")
    }

    fn statement_end(&self) -> &'static str {
        ""
    }

    fn line_pragma_start(&self, line: usize, file: &str) -> String {
        format!("#ExternalSource({}, {})", self.string_literal(file), line + 1)
    }

    fn line_pragma_end(&self) -> String {
        "#End ExternalSource".to_string()
    }

    fn import(&self, namespace: &str) -> String {
        format!("Imports {}", namespace)
    }

    fn namespace_start(&self, namespace: &str) -> String {
        format!("Namespace {}", namespace)
    }

    fn namespace_end(&self) -> String {
        "End Namespace".to_string()
    }

    fn class_start(&self, class_name: &str, base: &str) -> String {
        format!("Public Class {}\nInherits {}", class_name, base)
    }

    fn class_end(&self) -> String {
        "End Class".to_string()
    }

    fn generic_base(&self, base: &str, model: &str) -> String {
        format!("{}(Of {})", base, model)
    }

    fn execute_start(&self, context: &GeneratedCodeContext) -> String {
        format!("Public Overrides Sub {}()", context.execute_method)
    }

    fn execute_end(&self) -> String {
        "End Sub".to_string()
    }

    fn design_time_field(&self) -> String {
        "Private Shared __o As Object".to_string()
    }

    fn design_time_helper_start(&self) -> String {
        "Private Sub __RazorDesignTimeHelpers__()".to_string()
    }

    fn design_time_helper_end(&self) -> String {
        "End Sub".to_string()
    }

    fn design_time_assignment(&self) -> &'static str {
        "__o = "
    }

    fn type_placeholder(&self, variable: &str) -> (String, String) {
        (format!("Dim {} As ", variable), " = Nothing".to_string())
    }

    fn section_start(&self, context: &GeneratedCodeContext, name: &str) -> String {
        format!(
            "{}({}, Sub()",
            context.define_section_method,
            self.string_literal(name)
        )
    }

    fn section_end(&self) -> String {
        "End Sub)".to_string()
    }

    fn template_start(&self, context: &GeneratedCodeContext) -> String {
        format!(
            "Function(item) New {}(Sub({})",
            context.template_type_name, context.template_writer_name
        )
    }

    fn template_end(&self) -> String {
        "End Sub)".to_string()
    }

    fn helper_start(&self, context: &GeneratedCodeContext, header: &str) -> String {
        format!(
            "Public Shared Function {} As {}\nReturn New {}(Sub({})",
            header,
            context.template_type_name,
            context.template_type_name,
            context.helper_writer_name
        )
    }

    fn helper_end(&self) -> String {
        "End Sub)\nEnd Function".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csharp_string_literal_escapes() {
        let writer = CSharpWriter;
        assert_eq!(writer.string_literal("a\"b\\c\r\n"), "\"a\\\"b\\\\c\\r\\n\"");
        assert_eq!(writer.string_literal(""), "\"\"");
    }

    #[test]
    fn test_basic_string_literal_splits_line_breaks() {
        let writer = BasicWriter;
        assert_eq!(writer.string_literal("a\"b"), "\"a\"\"b\"");
        assert_eq!(
            writer.string_literal("x\r\ny"),
            "\"x\" & ChrW(13) & ChrW(10) & \"y\""
        );
        assert_eq!(writer.string_literal("\n"), "ChrW(10)");
        assert_eq!(writer.string_literal(""), "\"\"");
    }

    #[test]
    fn test_calls_and_pragmas() {
        assert_eq!(CSharpWriter.call("Write", &["x"]), "Write(x);");
        assert_eq!(BasicWriter.call("WriteTo", &["w", "x"]), "WriteTo(w, x)");
        assert_eq!(CSharpWriter.line_pragma_start(0, "a.cshtml"), "#line 1 \"a.cshtml\"");
        assert_eq!(
            BasicWriter.line_pragma_start(4, "a.vbhtml"),
            "#ExternalSource(\"a.vbhtml\", 5)"
        );
    }

    #[test]
    fn test_generic_base() {
        assert_eq!(CSharpWriter.generic_base("Page", "Foo"), "Page<Foo>");
        assert_eq!(BasicWriter.generic_base("Page", "Foo"), "Page(Of Foo)");
    }

    #[test]
    fn test_writer_for_language() {
        assert_eq!(writer_for(TargetLanguage::Basic).language(), TargetLanguage::Basic);
        assert_eq!(writer_for(TargetLanguage::CSharp).language(), TargetLanguage::CSharp);
    }
}
