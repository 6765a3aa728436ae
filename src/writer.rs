//! Output of token sequences.

use std::io::Write;

use crate::{Result, Token};

/// Write the tokens to the output, one `<name, value>` line per token.
/// # Errors
/// Returns an `IoError` if writing fails.
pub fn write_tokens<'a, W, I>(output: &mut W, tokens: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a Token>,
{
    for token in tokens {
        writeln!(output, "{}", token)?;
    }
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, Pattern};

    #[test]
    fn test_write_tokens() {
        let tokenizer = compile(&Pattern::from_pairs([
            ("num", "[0-9]+"),
            ("op", "\\+|-"),
        ]))
        .unwrap();
        let tokens = tokenizer.scan("1+23-4").unwrap();
        let mut output = Vec::new();
        write_tokens(&mut output, &tokens).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "<num, 1>\n<op, +>\n<num, 23>\n<op, ->\n<num, 4>\n"
        );
    }
}
