use anyhow::{anyhow, Context};

use crate::AppResult;

/// Decodes a program text made of whitespace or comma separated hexadecimal
/// byte tokens. `0x` prefixes are accepted and `#` opens a comment running to
/// the end of the line.
pub fn parse_program(text: &str) -> AppResult<Vec<u8>> {
    let mut program: Vec<u8> = Vec::new();

    for line in text.lines() {
        let code = line.split('#').next().unwrap_or("");

        for token in code.split(|c: char| c.is_whitespace() || c == ',') {
            if token.is_empty() {
                continue;
            }
            let digits = token.trim_start_matches("0x");
            let bytes = hex::decode(digits)
                .with_context(|| format!("invalid byte token '{token}'"))?;
            program.extend_from_slice(&bytes);
        }
    }

    if program.is_empty() {
        return Err(anyhow!("the program text contains no bytes"));
    }

    Ok(program)
}
