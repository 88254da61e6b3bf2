use crate::config::EmitterConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;

pub type WriteResult = Result<()>;

/// A code generation failure that was degraded to an inert comment in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenDiagnostic {
    pub contract: String,
    pub member: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct EmitContext {
    pub indent_level: usize,
    pub indent_chars: String,
    pub emit_comments: bool,
    contract: String,
    member: Option<String>,
    next_temp: usize,
    diagnostics: Vec<CodegenDiagnostic>,
}

impl EmitContext {
    pub fn new() -> Self {
        Self::with_config(&EmitterConfig::default())
    }

    pub fn with_config(config: &EmitterConfig) -> Self {
        Self {
            indent_level: 0,
            indent_chars: config.indent_style.unit(),
            emit_comments: config.emit_comments,
            contract: String::new(),
            member: None,
            next_temp: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    pub fn get_indent(&self) -> String {
        self.indent_chars.repeat(self.indent_level)
    }

    pub fn begin_contract(&mut self, name: &str) {
        self.contract = name.to_string();
        self.member = None;
        self.next_temp = 0;
    }

    /// Enters a function body. Temporaries are numbered per function so that
    /// editing one method never renumbers another.
    pub fn begin_member(&mut self, name: &str) {
        self.member = Some(name.to_string());
        self.next_temp = 0;
    }

    pub fn end_member(&mut self) {
        self.member = None;
    }

    pub fn fresh_temp(&mut self) -> String {
        let name = format!("__t{}", self.next_temp);
        self.next_temp += 1;
        name
    }

    pub fn report(&mut self, message: impl Into<String>) {
        self.diagnostics.push(CodegenDiagnostic {
            contract: self.contract.clone(),
            member: self.member.clone(),
            message: message.into(),
        });
    }

    pub fn diagnostics(&self) -> &[CodegenDiagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<CodegenDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

impl Default for EmitContext {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Emitter {
    type Item;

    fn emit<W: Write>(
        &self,
        item: &Self::Item,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> WriteResult;

    fn emit_to_string(&self, item: &Self::Item) -> Result<String> {
        let mut buffer = Vec::new();
        let mut context = EmitContext::new();
        self.emit(item, &mut buffer, &mut context)?;
        Ok(String::from_utf8(buffer)?)
    }
}

pub struct EmitHelper;

impl EmitHelper {
    pub fn write_line<W: Write>(writer: &mut W, context: &EmitContext, text: &str) -> WriteResult {
        writeln!(writer, "{}{}", context.get_indent(), text)?;
        Ok(())
    }

    pub fn write_lines<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        lines: &[String],
    ) -> WriteResult {
        for line in lines {
            Self::write_line(writer, context, line)?;
        }
        Ok(())
    }

    pub fn write_blank<W: Write>(writer: &mut W) -> WriteResult {
        writeln!(writer)?;
        Ok(())
    }

    /// Comments that only exist for readers; suppressed when comments are off.
    pub fn write_comment<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        comment: &str,
    ) -> WriteResult {
        if context.emit_comments {
            Self::write_line(writer, context, &format!("// {}", comment))?;
        }
        Ok(())
    }

    /// Codegen failures are always written, whatever the comment setting.
    pub fn write_error<W: Write>(writer: &mut W, context: &EmitContext, message: &str) -> WriteResult {
        Self::write_line(writer, context, &format!("// ERROR: {}", message))
    }

    pub fn write_section<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        title: &str,
    ) -> WriteResult {
        if context.emit_comments {
            writeln!(writer)?;
            Self::write_line(writer, context, &format!("// ===== {} =====", title))?;
        }
        Ok(())
    }

    pub fn write_block<W: Write, F>(
        writer: &mut W,
        context: &mut EmitContext,
        header: &str,
        body: F,
    ) -> WriteResult
    where
        F: FnOnce(&mut W, &mut EmitContext) -> WriteResult,
    {
        Self::write_line(writer, context, &format!("{} {{", header))?;
        context.indent();
        body(writer, context)?;
        context.dedent();
        Self::write_line(writer, context, "}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndentStyle;

    #[test]
    fn test_context_indentation() {
        let mut ctx = EmitContext::new();
        assert_eq!(ctx.get_indent(), "");

        ctx.indent();
        ctx.indent();
        assert_eq!(ctx.get_indent(), "    ");

        ctx.dedent();
        ctx.dedent();
        ctx.dedent();
        assert_eq!(ctx.indent_level, 0);
    }

    #[test]
    fn test_tab_indent_from_config() {
        let config = EmitterConfig {
            indent_style: IndentStyle::Tabs,
            ..EmitterConfig::default()
        };
        let mut ctx = EmitContext::with_config(&config);
        ctx.indent();
        assert_eq!(ctx.get_indent(), "\t");
    }

    #[test]
    fn test_temporaries_restart_per_member() {
        let mut ctx = EmitContext::new();
        ctx.begin_member("a");
        assert_eq!(ctx.fresh_temp(), "__t0");
        assert_eq!(ctx.fresh_temp(), "__t1");
        ctx.begin_member("b");
        assert_eq!(ctx.fresh_temp(), "__t0");
    }

    #[test]
    fn test_diagnostics_carry_location() {
        let mut ctx = EmitContext::new();
        ctx.begin_contract("Token");
        ctx.begin_member("mint");
        ctx.report("no handler");
        ctx.end_member();
        ctx.report("bad event");

        let diagnostics = ctx.take_diagnostics();
        assert_eq!(diagnostics[0].member.as_deref(), Some("mint"));
        assert_eq!(diagnostics[1].member, None);
        assert!(ctx.diagnostics().is_empty());
    }

    #[test]
    fn test_write_block() {
        let mut buffer = Vec::new();
        let mut ctx = EmitContext::new();

        EmitHelper::write_block(&mut buffer, &mut ctx, "function f(): void", |w, c| {
            EmitHelper::write_line(w, c, "return;")
        })
        .unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(output, "function f(): void {\n  return;\n}\n");
    }

    #[test]
    fn test_comments_can_be_suppressed_but_errors_cannot() {
        let mut buffer = Vec::new();
        let mut ctx = EmitContext::new();
        ctx.emit_comments = false;

        EmitHelper::write_comment(&mut buffer, &ctx, "hidden").unwrap();
        EmitHelper::write_error(&mut buffer, &ctx, "shown").unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "// ERROR: shown\n");
    }
}
