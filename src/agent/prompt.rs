//! System prompts and template rendering for the research agent.
//!
//! Two prompts drive a run: the researcher system prompt (rendered with
//! today's date when a thread is created) and the formatting instruction
//! used by the final pass. Both can be overridden from a prompt directory.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

/// Reserved token the model emits to end the research phase early.
///
/// Matched as an exact, case-sensitive substring of the response text.
pub const COMPLETION_SENTINEL: &str = "RESEARCH_COMPLETE";

/// Placeholder replaced with the current date in the system template.
const TODAY_PLACEHOLDER: &str = "{today}";

/// Placeholder replaced with [`COMPLETION_SENTINEL`] in the system template.
const SENTINEL_PLACEHOLDER: &str = "{sentinel}";

/// System prompt template for the research agent.
pub const RESEARCH_SYSTEM_PROMPT: &str = r"You are an expert research assistant. You gather information from the web, cross-check it, and ground every conclusion in credible, current sources.

**Today's Date:** {today}

## Tools

1. **web_search** - Run a web search. Returns up to 10 results ranked by relevance, each with a title, URL and content. Supports an optional time range (day, week, month, year) and a domain allow-list.
2. **web_extract** - Extract the full content of one or more pages by URL. Use it when a search result looks promising and you need the page itself.
3. **web_crawl** - Crawl a site from a starting URL and return the content of the linked pages it discovers. Use it for documentation sites or anything spread across many pages.

## Process

- Start by writing a short plan: what do you need to know to answer the question?
- Call tools as many times as you need, in any combination. You may request several tools in one turn when they do not depend on each other.
- Tool failures come back as text. Read them and adjust (retry with a different URL or query, or move on).
- When you have enough material, stop calling tools and reply with a summary of what you found that includes the token {sentinel}. A separate formatting pass will turn your research into the final cited answer.";

/// Formatting instruction for the final pass.
pub const FORMATTER_PROMPT: &str = r#"You are a research response formatter. Turn the research gathered in this conversation into a well-structured, properly cited answer.

Always:
1. Cite EVERY factual claim inline using [n] notation.
2. End with a "Sources" section listing each numbered reference with its URL.
3. Write concisely, with no repetition or filler.
4. Keep every sentence informative.
5. Keep a professional, objective tone.
6. Format the response in markdown.

The answer must directly address the user's latest question, be organised into clear sections, and match the style the question calls for (direct answer, report, summary, and so on). Include only information relevant to the question."#;

/// Default prompt directory under the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/deep-research/prompts";

/// Filename for the system prompt template.
const SYSTEM_FILENAME: &str = "system.md";
/// Filename for the formatter prompt.
const FORMATTER_FILENAME: &str = "formatter.md";

/// Renders a system prompt template for the given date.
///
/// The date is written as `Monday, October 19, 2026`.
#[must_use]
pub fn render_system_prompt(template: &str, date: NaiveDate) -> String {
    template
        .replace(TODAY_PLACEHOLDER, &date.format("%A, %B %d, %Y").to_string())
        .replace(SENTINEL_PLACEHOLDER, COMPLETION_SENTINEL)
}

/// Returns `true` when the response text carries the completion sentinel.
#[must_use]
pub fn contains_sentinel(content: &str) -> bool {
    content.contains(COMPLETION_SENTINEL)
}

/// The prompts used by a research run.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// System prompt template for the researcher.
    pub system: String,
    /// Instruction for the formatting pass.
    pub formatter: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument
    /// 2. `RESEARCH_PROMPT_DIR` environment variable
    /// 3. `~/.config/deep-research/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("RESEARCH_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(|| dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR)));

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            system: load_file(SYSTEM_FILENAME, RESEARCH_SYSTEM_PROMPT),
            formatter: load_file(FORMATTER_FILENAME, FORMATTER_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            system: RESEARCH_SYSTEM_PROMPT.to_string(),
            formatter: FORMATTER_PROMPT.to_string(),
        }
    }

    /// Renders the system prompt for today's local date.
    #[must_use]
    pub fn system_prompt_for_today(&self) -> String {
        render_system_prompt(&self.system, Local::now().date_naive())
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (SYSTEM_FILENAME, RESEARCH_SYSTEM_PROMPT),
            (FORMATTER_FILENAME, FORMATTER_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }
        Ok(written)
    }

    /// Returns the default prompt directory, if a home directory is known.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}
