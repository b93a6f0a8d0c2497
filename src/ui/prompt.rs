use std::io::{self, BufRead, Write};

/// Asks a yes/no question and reads one line of answer. Only `y` or `yes`
/// (any case) confirms; anything else, including end of input, declines.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    write!(output, "{} (y/N): ", question)?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Ok(false);
    }

    Ok(is_affirmative(&answer))
}

/// Prompts on the controlling terminal.
pub fn confirm_on_terminal(question: &str) -> io::Result<bool> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    confirm(&mut input, &mut output, question)
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
