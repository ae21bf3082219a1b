//! Code Generation
//!
//! [`CodeGenerator`] walks a parsed tree and produces target-language source
//! for a class whose execute method renders the template.
//!
//! ```text
//! imports
//! namespace
//! └── class : base<model>
//!     ├── design-time helper     (design-time only: type placeholders)
//!     ├── members                (functions blocks, helpers)
//!     └── execute method         (literals, expressions, statements, sections)
//! ```
//!
//! Output is collected as fragments in three buffers and assembled at the
//! end. Fragments holding user code remember where they came from, so
//! assembly can record a [`LineMapping`] for each of them in design-time
//! mode.
//!
//! Structural errors in the tree never stop generation.

use super::block::{Block, BlockType};
use super::code_writer::{writer_for, CodeWriter};
use super::dialect::TargetLanguage;
use super::error::RazorError;
use super::host::HostConfig;
use super::parser::ParserResults;
use super::source_location::{SourceLocation, SourceLocationTracker};
use super::span::{Span, SpanGenerator};
use super::visitor::{visit_results, ParserVisitor};
use serde::{Deserialize, Serialize};

const INDENT: &str = "    ";

/// Nesting of the members buffer inside namespace and class
const MEMBER_INDENT: usize = 2;

/// Nesting of the body buffer inside namespace, class and method
const BODY_INDENT: usize = 3;

/// A region of user code and where it landed in the generated text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMapping {
    /// Where the code starts in the template
    pub source_start: SourceLocation,
    /// Length of the code in the template, in bytes
    pub source_length: usize,
    /// Where the same code starts in the generated text
    pub generated_start: SourceLocation,
    /// Length of the code in the generated text, in bytes
    pub generated_length: usize,
}

/// Outcome of generating code for a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorResults {
    /// Whether the template parsed without structural errors
    pub success: bool,
    /// The tree code was generated from
    pub document: Block,
    /// Structural errors found while parsing
    pub errors: Vec<RazorError>,
    /// Generated source text
    pub generated_code: String,
    /// User code locations, in generated order (design-time only)
    pub mappings: Vec<LineMapping>,
}

impl GeneratorResults {
    /// Serialize the results to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The generated text covered by `mapping`
    pub fn generated_text(&self, mapping: &LineMapping) -> Option<&str> {
        let start = mapping.generated_start.absolute_offset;
        self.generated_code
            .get(start..start + mapping.generated_length)
    }
}

// ============================================================================
// Buffers
// ============================================================================

#[derive(Debug)]
struct Fragment {
    text: String,
    source: Option<(SourceLocation, usize)>,
}

/// Generated text under construction, with its own indentation
#[derive(Debug)]
struct CodeBuffer {
    fragments: Vec<Fragment>,
    indent: usize,
}

impl CodeBuffer {
    fn new(indent: usize) -> Self {
        Self {
            fragments: Vec::new(),
            indent,
        }
    }

    fn push(&mut self, text: impl Into<String>) {
        self.fragments.push(Fragment {
            text: text.into(),
            source: None,
        });
    }

    fn push_mapped(&mut self, text: &str, start: SourceLocation) {
        self.fragments.push(Fragment {
            text: text.to_string(),
            source: Some((start, text.len())),
        });
    }

    /// Write each line of `text` at the current indentation
    fn line(&mut self, text: &str) {
        for line in text.split('\n') {
            let indented = format!("{}{}\n", INDENT.repeat(self.indent), line);
            self.push(indented);
        }
    }

    /// Write `code` from `start` verbatim between `prefix` and `suffix`
    fn mapped_line(&mut self, prefix: &str, code: &str, start: SourceLocation, suffix: &str) {
        self.push(format!("{}{}", INDENT.repeat(self.indent), prefix));
        self.push_mapped(code, start);
        if code.ends_with('\n') || code.ends_with('\r') {
            self.push(suffix.to_string());
        } else {
            self.push(format!("{}\n", suffix));
        }
    }
}

/// Concatenates fragments while tracking generated locations
struct Assembler {
    output: String,
    tracker: SourceLocationTracker,
    mappings: Vec<LineMapping>,
    record_mappings: bool,
}

impl Assembler {
    fn new(record_mappings: bool) -> Self {
        Self {
            output: String::new(),
            tracker: SourceLocationTracker::default(),
            mappings: Vec::new(),
            record_mappings,
        }
    }

    fn write(&mut self, text: &str) {
        self.output.push_str(text);
        self.tracker.advance_str(text);
    }

    fn line(&mut self, indent: usize, text: &str) {
        for line in text.split('\n') {
            self.write(&INDENT.repeat(indent));
            self.write(line);
            self.write("\n");
        }
    }

    fn buffer(&mut self, buffer: &CodeBuffer) {
        for fragment in &buffer.fragments {
            if let (Some((source_start, source_length)), true) =
                (fragment.source, self.record_mappings)
            {
                self.mappings.push(LineMapping {
                    source_start,
                    source_length,
                    generated_start: self.tracker.location(),
                    generated_length: fragment.text.len(),
                });
            }
            self.write(&fragment.text);
        }
    }
}

// ============================================================================
// Generator
// ============================================================================

#[derive(Debug)]
struct Frame {
    block_type: BlockType,
    opened: bool,
}

/// Tree visitor producing target-language source
pub struct CodeGenerator<'h> {
    host: &'h HostConfig,
    writer: Box<dyn CodeWriter>,
    imports: Vec<String>,
    model_type: Option<String>,
    base_type: Option<String>,
    placeholders: CodeBuffer,
    members: CodeBuffer,
    body: CodeBuffer,
    frames: Vec<Frame>,
    errors: Vec<RazorError>,
}

impl<'h> CodeGenerator<'h> {
    /// Create a generator writing `language` for `host`
    pub fn new(host: &'h HostConfig, language: TargetLanguage) -> Self {
        Self {
            host,
            writer: writer_for(language),
            imports: host.default_imports.clone(),
            model_type: None,
            base_type: None,
            placeholders: CodeBuffer::new(BODY_INDENT),
            members: CodeBuffer::new(MEMBER_INDENT),
            body: CodeBuffer::new(BODY_INDENT),
            frames: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Generate code for parsed `results`
    pub fn generate(
        host: &'h HostConfig,
        language: TargetLanguage,
        results: ParserResults,
    ) -> GeneratorResults {
        let mut generator = Self::new(host, language);
        visit_results(&mut generator, &results);
        generator.finish(results.document)
    }

    /// Assemble the generated text for `document`
    pub fn finish(self, document: Block) -> GeneratorResults {
        let writer = self.writer.as_ref();
        let mut out = Assembler::new(self.host.design_time);

        for import in &self.imports {
            out.line(0, &writer.import(import));
        }
        out.line(0, &writer.namespace_start(&self.host.namespace));

        let base = self.base_type.as_deref().unwrap_or(&self.host.base_class);
        let base = match self.model_type.as_deref() {
            Some(model) => writer.generic_base(base, model),
            None => base.to_string(),
        };
        out.line(1, &writer.class_start(&self.host.class_name, &base));

        if self.host.design_time {
            out.line(MEMBER_INDENT, &writer.design_time_field());
            out.line(MEMBER_INDENT, &writer.design_time_helper_start());
            out.buffer(&self.placeholders);
            out.line(MEMBER_INDENT, &writer.design_time_helper_end());
        }
        out.buffer(&self.members);

        out.line(MEMBER_INDENT, &writer.execute_start(&self.host.context));
        out.buffer(&self.body);
        out.line(MEMBER_INDENT, &writer.execute_end());

        out.line(1, &writer.class_end());
        out.line(0, &writer.namespace_end());

        log_debug!(
            "Generated {} bytes with {} mappings",
            out.output.len(),
            out.mappings.len()
        );

        GeneratorResults {
            success: self.errors.is_empty(),
            document,
            errors: self.errors,
            generated_code: out.output,
            mappings: out.mappings,
        }
    }

    // ========================================================================
    // Targets
    // ========================================================================

    fn in_helper(&self) -> bool {
        self.frames
            .iter()
            .any(|frame| frame.block_type == BlockType::Helper)
    }

    /// Buffer receiving execute-time code at this point of the walk
    fn target(&mut self) -> &mut CodeBuffer {
        if self.in_helper() {
            &mut self.members
        } else {
            &mut self.body
        }
    }

    /// Writer variable of the innermost template or helper
    fn output_writer(&self) -> Option<&'h str> {
        let context = &self.host.context;
        self.frames
            .iter()
            .rev()
            .find_map(|frame| match frame.block_type {
                BlockType::Template => Some(context.template_writer_name.as_str()),
                BlockType::Helper => Some(context.helper_writer_name.as_str()),
                _ => None,
            })
    }

    fn open_frame(&mut self, block_type: BlockType) -> bool {
        match self.frames.last_mut() {
            Some(frame) if frame.block_type == block_type && !frame.opened => {
                frame.opened = true;
                true
            }
            _ => false,
        }
    }

    // ========================================================================
    // Spans
    // ========================================================================

    fn write_literal(&mut self, span: &Span) {
        if self.host.design_time || span.hidden || span.content.is_empty() {
            return;
        }
        let literal = self.writer.string_literal(&span.content);
        let context = &self.host.context;
        let call = match self.output_writer() {
            Some(writer) => self
                .writer
                .call(&context.write_literal_to_method, &[writer, &literal]),
            None => self.writer.call(&context.write_literal_method, &[&literal]),
        };
        self.target().line(&call);
    }

    fn write_expression(&mut self, span: &Span) {
        let code = span.content.trim_end();
        if code.trim().is_empty() {
            return;
        }

        if self.host.design_time {
            let prefix = self.writer.design_time_assignment();
            let suffix = self.writer.statement_end();
            self.target().mapped_line(prefix, code, span.start, suffix);
            return;
        }

        let context = &self.host.context;
        let call = match self.output_writer() {
            Some(writer) => self.writer.call(&context.write_to_method, &[writer, code]),
            None => self.writer.call(&context.write_method, &[code]),
        };
        let pragma = self.pragma(span.start);
        let end = self.writer.line_pragma_end();
        let target = self.target();
        match pragma {
            Some(start) => {
                target.line(&start);
                target.line(&call);
                target.line(&end);
            }
            None => target.line(&call),
        }
    }

    fn write_code(&mut self, span: &Span, members: bool) {
        if span.content.is_empty() {
            return;
        }
        let pragma = if self.host.design_time {
            None
        } else {
            self.pragma(span.start)
        };
        let end = self.writer.line_pragma_end();
        let design_time = self.host.design_time;
        let target = if members {
            &mut self.members
        } else {
            self.target()
        };

        if let Some(start) = pragma.as_deref() {
            target.line(start);
        }
        if design_time {
            target.mapped_line("", &span.content, span.start, "");
        } else {
            target.push(span.content.clone());
            if !span.content.ends_with('\n') && !span.content.ends_with('\r') {
                target.push("\n");
            }
        }
        if pragma.is_some() {
            target.line(&end);
        }
    }

    fn pragma(&self, start: SourceLocation) -> Option<String> {
        self.host
            .pragma_file()
            .map(|file| self.writer.line_pragma_start(start.line, file))
    }

    /// Record a type-only directive value
    fn write_type_placeholder(&mut self, span: &Span, variable: &str) -> Option<String> {
        let value = span.content.trim();
        if value.is_empty() {
            return None;
        }
        if self.host.design_time {
            let leading = span.content.len() - span.content.trim_start().len();
            let start =
                SourceLocationTracker::calculate_new_location(span.start, &span.content[..leading]);
            let (before, after) = self.writer.type_placeholder(variable);
            self.placeholders.mapped_line(&before, value, start, &after);
        }
        Some(value.to_string())
    }

    fn write_layout(&mut self, span: &Span) {
        let value = span.content.trim().trim_matches('"');
        if value.is_empty() || self.host.design_time {
            return;
        }
        let assignment = self
            .writer
            .property_assignment(&self.host.context.layout_property, value);
        self.body.line(&assignment);
    }

    fn add_import(&mut self, span: &Span) {
        let namespace = span
            .content
            .trim()
            .trim_end_matches(';')
            .trim_end()
            .to_string();
        if !namespace.is_empty() && !self.imports.contains(&namespace) {
            self.imports.push(namespace);
        }
    }

    fn open_section(&mut self, span: &Span) {
        if !self.open_frame(BlockType::Section) {
            return;
        }
        let start = self
            .writer
            .section_start(&self.host.context, span.content.trim());
        let target = self.target();
        target.line(&start);
        target.indent += 1;
    }

    fn open_helper(&mut self, span: &Span) {
        if !self.open_frame(BlockType::Helper) {
            return;
        }
        let start = self
            .writer
            .helper_start(&self.host.context, span.content.trim());
        self.members.line(&start);
        self.members.indent += 1;
    }
}

impl ParserVisitor for CodeGenerator<'_> {
    fn visit_start_block(&mut self, block: &Block) {
        self.frames.push(Frame {
            block_type: block.block_type,
            opened: false,
        });
        if block.block_type == BlockType::Template {
            let start = self.writer.template_start(&self.host.context);
            self.open_frame(BlockType::Template);
            let target = self.target();
            target.line(&start);
            target.indent += 1;
        }
    }

    fn visit_span(&mut self, span: &Span) {
        match span.generator {
            SpanGenerator::None => {}
            SpanGenerator::Literal => self.write_literal(span),
            SpanGenerator::Expression => self.write_expression(span),
            SpanGenerator::Statement => self.write_code(span, false),
            SpanGenerator::TypeMember => self.write_code(span, true),
            SpanGenerator::ModelType => {
                if let Some(model) = self.write_type_placeholder(span, "__modelHelper") {
                    self.model_type = Some(model);
                }
            }
            SpanGenerator::BaseType => {
                if let Some(base) = self.write_type_placeholder(span, "__inheritsHelper") {
                    self.base_type = Some(base);
                }
            }
            SpanGenerator::Layout => self.write_layout(span),
            SpanGenerator::Import => self.add_import(span),
            SpanGenerator::SectionName => self.open_section(span),
            SpanGenerator::HelperHeader => self.open_helper(span),
        }
    }

    fn visit_end_block(&mut self, _block: &Block) {
        let frame = match self.frames.last() {
            Some(frame) if frame.opened => frame.block_type,
            _ => {
                self.frames.pop();
                return;
            }
        };

        let end = match frame {
            BlockType::Section => self.writer.section_end(),
            BlockType::Template => self.writer.template_end(),
            _ => self.writer.helper_end(),
        };
        let target = if frame == BlockType::Helper {
            &mut self.members
        } else {
            self.target()
        };
        target.indent = target.indent.saturating_sub(1);
        target.line(&end);
        self.frames.pop();
    }

    fn visit_error(&mut self, error: &RazorError) {
        self.errors.push(error.clone());
    }

    fn on_complete(&mut self) {
        log_trace!("Code generation walk complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::RazorParser;

    fn generate(input: &str, host: &HostConfig) -> GeneratorResults {
        let results = RazorParser::c_like().parse_str(input).unwrap();
        CodeGenerator::generate(host, TargetLanguage::CSharp, results)
    }

    #[test]
    fn test_runtime_literals_and_expressions() {
        let results = generate("foo @user.name baz", &HostConfig::default());
        let code = &results.generated_code;
        assert!(results.success);
        assert!(code.contains("WriteLiteral(\"foo \");"));
        assert!(code.contains("Write(user.name);"));
        assert!(code.contains("WriteLiteral(\" baz\");"));
        assert!(code.find("foo").unwrap() < code.find("user.name").unwrap());
        assert!(results.mappings.is_empty());
    }

    #[test]
    fn test_design_time_mappings_point_at_user_code() {
        let input = "foo @user.name baz";
        let host = HostConfig::new().with_design_time(true);
        let results = generate(input, &host);
        assert!(!results.generated_code.contains("WriteLiteral"));
        assert!(results.generated_code.contains("__o = user.name;"));

        assert_eq!(results.mappings.len(), 1);
        let mapping = results.mappings[0];
        assert_eq!(mapping.source_start.absolute_offset, 5);
        assert_eq!(mapping.source_length, 9);
        assert_eq!(results.generated_text(&mapping), Some("user.name"));
        assert_eq!(
            mapping.generated_start,
            SourceLocation::from_offset(&results.generated_code, mapping.generated_start.absolute_offset)
        );
    }

    #[test]
    fn test_model_and_import_directives() {
        let input = "@using Foo.Bar\n@model Person\n<p>@Model.Name</p>";
        let results = generate(input, &HostConfig::default());
        let code = &results.generated_code;
        assert!(code.starts_with("using System;\n"));
        assert!(code.contains("using Foo.Bar;"));
        assert!(code.contains("public class Template : TemplateBase<Person> {"));
        assert!(code.contains("Write(Model.Name);"));
    }

    #[test]
    fn test_model_placeholder_in_design_time() {
        let input = "@model Person\nhi";
        let host = HostConfig::new().with_design_time(true);
        let results = generate(input, &host);
        assert!(results.generated_code.contains("Person __modelHelper = null;"));
        let mapping = results.mappings[0];
        assert_eq!(mapping.source_start.absolute_offset, 7);
        assert_eq!(results.generated_text(&mapping), Some("Person"));
    }

    #[test]
    fn test_statements_and_sections() {
        let input = "@{ var x = 1; }\n@section Side { <b>@x</b> }";
        let results = generate(input, &HostConfig::default());
        let code = &results.generated_code;
        assert!(code.contains(" var x = 1; "));
        assert!(code.contains("DefineSection(\"Side\", () => {"));
        assert!(code.contains("});"));
        assert!(code.find("DefineSection").unwrap() < code.find("Write(x);").unwrap());
    }

    #[test]
    fn test_helper_goes_to_members() {
        let input = "@helper Bold(string s) {<b>@s</b>}\n@Bold(\"x\")";
        let results = generate(input, &HostConfig::default());
        let code = &results.generated_code;
        let helper = code.find("public static HelperResult Bold(string s) {").unwrap();
        let execute = code.find("public override void Execute()").unwrap();
        assert!(helper < execute);
        assert!(code.contains("WriteTo(__razor_helper_writer, s);"));
        assert!(code.contains("WriteLiteralTo(__razor_helper_writer, \"<b>\");"));
    }

    #[test]
    fn test_line_pragmas() {
        let host = HostConfig::new().with_file_name("Index.cshtml");
        let results = generate("a\n@b", &host);
        assert!(results.generated_code.contains("#line 2 \"Index.cshtml\""));
        assert!(results.generated_code.contains("#line default"));
    }

    #[test]
    fn test_errors_do_not_stop_generation() {
        let results = generate("@model A\n@model B\n@x", &HostConfig::default());
        assert!(!results.success);
        assert_eq!(results.errors.len(), 1);
        assert!(results.generated_code.contains("Write(x);"));
    }

    #[test]
    fn test_layout_assignment() {
        let results = generate("@layout ~/Shared/_Layout.cshtml\n", &HostConfig::default());
        assert!(results
            .generated_code
            .contains("Layout = \"~/Shared/_Layout.cshtml\";"));
    }
}
