use std::io::{self, BufRead, Write};

/// 打印提示并读取一行；空输入返回默认值
pub fn ask(question: &str, default: &str) -> io::Result<String> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    ask_with(&mut stdin.lock(), &mut stdout, question, default)
}

pub fn ask_with<R: BufRead, W: Write>(
    input: &mut R, output: &mut W, question: &str, default: &str,
) -> io::Result<String> {
    write!(output, "{} (default '{}'): ", question, default)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_answer_takes_default() {
        let mut input = io::Cursor::new("\n");
        let mut output = Vec::new();
        let answer = ask_with(&mut input, &mut output, "Enter root path", ".").unwrap();
        assert_eq!(answer, ".");
        assert_eq!(String::from_utf8(output).unwrap(), "Enter root path (default '.'): ");
    }

    #[test]
    fn answer_is_trimmed() {
        let mut input = io::Cursor::new("  D:\\shares  \r\n");
        let mut output = Vec::new();
        assert_eq!(ask_with(&mut input, &mut output, "Path", ".").unwrap(), "D:\\shares");
    }

    #[test]
    fn closed_input_takes_default() {
        let mut input = io::Cursor::new("");
        let mut output = Vec::new();
        assert_eq!(ask_with(&mut input, &mut output, "New owner", "Administrator").unwrap(), "Administrator");
    }
}
