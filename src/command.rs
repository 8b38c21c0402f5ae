//! Command-line construction for operator calls.
//!
//! A call becomes `cdo -O [options] -<operator>[,params] <input...> <output...>`.
//! Inputs may themselves be operator expressions (`-selname,T -stdatm,0`), so
//! calls nest by passing one call's expression or result path as the next
//! call's input.

use crate::constants::{FLAG_OVERWRITE, FORMAT_OPTION_TOKENS, STRUCTURED_FORMAT_OPTION};
use crate::error::{CdoError, Result};
use crate::models::{InvocationRequest, Param, ReturnShape};
use crate::runner::ToolCommand;
use std::path::{Path, PathBuf};

/// `-<operator>` with positional parameters appended comma-separated
pub fn operator_token(operator: &str, params: &[Param]) -> String {
    let mut token = format!("-{operator}");
    for param in params {
        token.push(',');
        token.push_str(&param.to_string());
    }
    token
}

/// An operator expression usable as another call's input
pub fn operator_expr<S: AsRef<str>>(operator: &str, params: &[Param], inputs: &[S]) -> String {
    let mut expr = operator_token(operator, params);
    for input in inputs {
        expr.push(' ');
        expr.push_str(input.as_ref());
    }
    expr
}

/// Split the raw option string, adding a structured-data format selector
/// when the return shape needs one and none was given
pub fn effective_options(
    operator: &str,
    options: Option<&str>,
    shape: &ReturnShape,
) -> Result<Vec<String>> {
    let mut tokens = match options {
        Some(raw) => shell_words::split(raw).map_err(|e| {
            CdoError::invalid_request(operator, format!("unparseable options '{raw}': {e}"))
        })?,
        None => Vec::new(),
    };

    let has_format = tokens
        .iter()
        .any(|t| FORMAT_OPTION_TOKENS.contains(&t.as_str()));
    if shape.needs_structured_data() && !has_format {
        tokens.extend(STRUCTURED_FORMAT_OPTION.iter().map(|t| t.to_string()));
    }

    Ok(tokens)
}

/// Tokens of one input source: an existing path stays whole, anything else
/// is split like a shell word list
fn input_tokens(operator: &str, input: &str) -> Result<Vec<String>> {
    if Path::new(input).exists() {
        return Ok(vec![input.to_string()]);
    }

    shell_words::split(input).map_err(|e| {
        CdoError::invalid_request(operator, format!("unparseable input '{input}': {e}"))
    })
}

/// Assemble the full command for `request`
pub fn build(
    executable: &str,
    request: &InvocationRequest,
    options: &[String],
    outputs: &[PathBuf],
) -> Result<ToolCommand> {
    let mut command = ToolCommand::new(executable)
        .arg(FLAG_OVERWRITE)
        .args(options.iter().cloned())
        .arg(operator_token(&request.operator, &request.params));

    for input in &request.input {
        command = command.args(input_tokens(&request.operator, input)?);
    }

    Ok(command.args(outputs.iter().map(|p| p.to_string_lossy().into_owned())))
}
