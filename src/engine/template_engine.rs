//! Template Engine
//!
//! Parse and generate in one call. [`TemplateEngine`] pairs a
//! [`RazorParser`] with a [`HostConfig`] and picks the code writer from the
//! parser's dialect.

use super::codegen::{CodeGenerator, GeneratorResults};
use super::context::CancellationToken;
use super::error::ParseError;
use super::host::HostConfig;
use super::parser::{ParserResults, RazorParser};
use super::text_reader::{StrSource, TextSource};
use std::io::Read;

/// Parser and code generation settings for a family of templates
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    parser: RazorParser,
    host: HostConfig,
}

impl TemplateEngine {
    /// Create an engine
    pub fn new(parser: RazorParser, host: HostConfig) -> Self {
        Self { parser, host }
    }

    pub fn parser(&self) -> &RazorParser {
        &self.parser
    }

    pub fn host(&self) -> &HostConfig {
        &self.host
    }

    /// Parse without generating code
    pub fn parse_template(&self, input: &str) -> Result<ParserResults, ParseError> {
        self.parser.parse_str(input)
    }

    /// Parse `input` and generate code for it
    ///
    /// # Example
    ///
    /// ```
    /// use razorblade::TemplateEngine;
    ///
    /// let engine = TemplateEngine::default();
    /// let results = engine.generate_code("Hello @name!").unwrap();
    /// assert!(results.success);
    /// assert!(results.generated_code.contains("Write(name);"));
    /// ```
    pub fn generate_code(&self, input: &str) -> Result<GeneratorResults, ParseError> {
        let results = self.parser.parse_str(input)?;
        Ok(self.generate_from_results(results))
    }

    /// Parse a byte stream and generate code for it
    pub fn generate_code_from_reader<R: Read>(
        &self,
        reader: R,
    ) -> Result<GeneratorResults, ParseError> {
        let results = self.parser.parse_reader(reader)?;
        Ok(self.generate_from_results(results))
    }

    /// Parse and generate, giving up once `cancellation` fires
    pub fn generate_code_with_cancellation<S: TextSource>(
        &self,
        source: S,
        cancellation: CancellationToken,
    ) -> Result<GeneratorResults, ParseError> {
        let results = self.parser.parse_with_cancellation(source, cancellation)?;
        Ok(self.generate_from_results(results))
    }

    /// Generate code for an already parsed template
    pub fn generate_from_results(&self, results: ParserResults) -> GeneratorResults {
        CodeGenerator::generate(&self.host, self.parser.dialect().language, results)
    }

    /// Generate code for `input` under a different host configuration
    pub fn generate_code_with_host(
        &self,
        input: &str,
        host: &HostConfig,
    ) -> Result<GeneratorResults, ParseError> {
        let results = self.parser.parse(StrSource::new(input))?;
        Ok(CodeGenerator::generate(
            host,
            self.parser.dialect().language,
            results,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_dialect_generates_basic() {
        let engine = TemplateEngine::new(RazorParser::basic_like(), HostConfig::default());
        let results = engine.generate_code("Hi @name\n").unwrap();
        assert!(results.generated_code.contains("Imports System"));
        assert!(results.generated_code.contains("Public Class Template"));
        assert!(results.generated_code.contains("Write(name)"));
    }

    #[test]
    fn test_reader_and_str_agree() {
        let engine = TemplateEngine::default();
        let input = "<p>@x</p>";
        let from_str = engine.generate_code(input).unwrap();
        let from_reader = engine.generate_code_from_reader(input.as_bytes()).unwrap();
        assert_eq!(from_str.generated_code, from_reader.generated_code);
    }

    #[test]
    fn test_cancelled_generation() {
        let token = CancellationToken::new();
        token.cancel();
        let result = TemplateEngine::default()
            .generate_code_with_cancellation(StrSource::new("@x"), token);
        assert!(matches!(result, Err(ParseError::Cancelled)));
    }

    #[test]
    fn test_host_override() {
        let engine = TemplateEngine::default();
        let host = HostConfig::new().with_class_name("Other");
        let results = engine.generate_code_with_host("x", &host).unwrap();
        assert!(results.generated_code.contains("public class Other"));
    }
}
