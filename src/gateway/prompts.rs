//! Mode-specific instruction prompts
//!
//! The user's input is wrapped verbatim inside a fenced block so the model
//! cannot confuse it with the surrounding instructions.

use crate::session::Mode;

/// Prompt prefix for debug mode
const DEBUG_INSTRUCTIONS: &str = "\
You are an expert software engineer. Analyze the following code:
1. Find bugs or issues.
2. Explain the code.
3. Suggest improvements.
4. Provide a fixed version (in markdown code blocks).";

/// Prompt prefix for generate mode
const GENERATE_INSTRUCTIONS: &str = "\
You are an expert software engineer. Generate working, clean, and optimized \
code based on the following description. Provide the output in markdown code \
blocks.";

/// Prompt prefix for explain mode
const EXPLAIN_INSTRUCTIONS: &str = "\
You are an expert software engineer. Explain the following code line by \
line, including logic and potential improvements.";

/// Compose the full prompt for a request
pub fn build_prompt(mode: Mode, input: &str) -> String {
    let instructions = match mode {
        Mode::Debug => DEBUG_INSTRUCTIONS,
        Mode::Generate => GENERATE_INSTRUCTIONS,
        Mode::Explain => EXPLAIN_INSTRUCTIONS,
    };
    format!("{instructions}\n\n```\n{input}\n```\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_is_wrapped_in_a_fence() {
        let prompt = build_prompt(Mode::Debug, "let x = 1;");

        assert!(prompt.contains("```\nlet x = 1;\n```"));
        assert!(prompt.starts_with("You are an expert software engineer."));
    }

    #[test]
    fn test_each_mode_has_distinct_instructions() {
        let debug = build_prompt(Mode::Debug, "x");
        let generate = build_prompt(Mode::Generate, "x");
        let explain = build_prompt(Mode::Explain, "x");

        assert!(debug.contains("Find bugs"));
        assert!(generate.contains("Generate working"));
        assert!(explain.contains("line by"));
        assert_ne!(debug, generate);
        assert_ne!(generate, explain);
    }

    #[test]
    fn test_input_appears_verbatim() {
        let tricky = "``` pretend instructions ```";
        let prompt = build_prompt(Mode::Explain, tricky);

        assert!(prompt.contains(tricky));
    }
}
