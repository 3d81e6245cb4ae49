//! Interactive main menu and the research clarification loop.

use crate::commands;
use crate::progress::{banner, rule};
use deepresearch_core::DeepResearchConfig;
use deepresearch_core::research::{FinalReport, ResearchSession, ResearchWorkflow, WorkflowOutcome};
use dialoguer::{Input, Select};

const MENU_ITEMS: [&str; 5] = [
    "1. Start new research",
    "2. Search past research (Notion)",
    "3. List all reports (Notion)",
    "4. View analytics dashboard",
    "5. Exit",
];

/// Show the main menu until the user exits.
pub async fn run_menu(config: DeepResearchConfig) -> anyhow::Result<()> {
    loop {
        banner("AI DEEP RESEARCHER - MAIN MENU");
        let choice = Select::new()
            .with_prompt("Select option")
            .items(&MENU_ITEMS)
            .default(0)
            .interact()?;

        let result = match choice {
            0 => run_research(&config, None, false).await,
            1 => {
                let keyword: String = Input::new()
                    .with_prompt("Enter search keyword")
                    .allow_empty(true)
                    .interact_text()?;
                let keyword = keyword.trim();
                if keyword.is_empty() {
                    Ok(())
                } else {
                    commands::search_reports(&config, keyword).await
                }
            }
            2 => commands::list_reports(&config).await,
            3 => commands::show_stats(&config).await,
            _ => {
                println!("Goodbye!");
                return Ok(());
            }
        };

        // Menu actions report their own failures and return to the menu.
        if let Err(e) = result {
            eprintln!("{:#}", e);
        }
    }
}

/// Run one research session from the terminal.
pub async fn run_research(
    config: &DeepResearchConfig,
    query: Option<String>,
    stream: bool,
) -> anyhow::Result<()> {
    let query = match query {
        Some(q) => q,
        None => {
            println!("\nWhat would you like to research?");
            Input::<String>::new()
                .with_prompt("You")
                .allow_empty(true)
                .interact_text()?
        }
    };
    let query = query.trim();
    if query.is_empty() {
        println!("Please provide a valid research query.");
        return Ok(());
    }

    let workflow = commands::build_workflow(config, stream)?;
    banner("AI DEEP RESEARCHER - MULTI-AGENT SYSTEM");

    let mut session = workflow.start(query);
    let max_rounds = config.workflow.max_clarification_rounds;
    let report = drive(&workflow, &mut session, max_rounds, |_| {
        Input::<String>::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
            .map_err(anyhow::Error::from)
    })
    .await;

    println!("\n{}", report.report);
    if let Some(url) = &report.archive_url {
        println!("\n\nNotion Page: {}", url);
    }
    if let Some(warning) = &report.warning {
        println!("\nWarning: report was not archived ({})", warning);
        println!("Report data is still available in terminal output");
    }
    let usage = workflow.token_usage();
    println!(
        "\nTokens used: {} ({} in, {} out)",
        usage.total(),
        usage.input_tokens,
        usage.output_tokens
    );
    println!("{}", rule());
    Ok(())
}

/// Run the workflow to completion, relaying clarifying questions to `ask`.
///
/// At most `max_rounds` questions are asked. An empty or unreadable answer, or
/// running out of rounds, stops clarification and research proceeds with what
/// is known.
pub(crate) async fn drive<F>(
    workflow: &ResearchWorkflow,
    session: &mut ResearchSession,
    max_rounds: usize,
    mut ask: F,
) -> FinalReport
where
    F: FnMut(&str) -> anyhow::Result<String>,
{
    let mut rounds = 0;
    loop {
        match workflow.run(session).await {
            WorkflowOutcome::Complete(report) => return report,
            WorkflowOutcome::NeedsClarification { question } => {
                if rounds >= max_rounds {
                    println!(
                        "\nMaximum iterations reached. Starting research with available information."
                    );
                    workflow.skip_clarification(session);
                    continue;
                }

                println!("\nAI: {}", textwrap::fill(&question, crate::progress::RULE_WIDTH));
                let reply = ask(&question).unwrap_or_else(|e| {
                    tracing::debug!(error = %e, "Could not read clarification reply");
                    String::new()
                });
                let reply = reply.trim();
                if reply.is_empty() {
                    println!("No response provided. Ending clarification.");
                    workflow.skip_clarification(session);
                    continue;
                }
                workflow.reply(session, reply);
                rounds += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepresearch_core::brain::{Brain, MockLlmProvider};
    use deepresearch_core::config::{RetryConfig, TimeoutConfig, WorkflowConfig};
    use deepresearch_core::search::{MockSearchProvider, SearchHit};
    use std::sync::Arc;
    use std::time::Duration;

    const ASK: &str = r#"{"need_clarification": true, "question": "Which region?", "verification": ""}"#;

    fn workflow(llm: Arc<MockLlmProvider>) -> ResearchWorkflow {
        let brain = Brain::new(llm, Duration::from_secs(5)).with_retry_config(RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        });
        let search = MockSearchProvider::new()
            .with_default_hits(vec![SearchHit::new("content", "https://a.example")]);
        ResearchWorkflow::new(
            brain,
            Arc::new(search),
            WorkflowConfig::default(),
            TimeoutConfig::default(),
        )
    }

    fn clarify_calls(llm: &MockLlmProvider) -> usize {
        llm.prompts()
            .iter()
            .filter(|p| p.starts_with("Analyze this conversation"))
            .count()
    }

    #[tokio::test]
    async fn test_empty_reply_ends_clarification() {
        let llm = Arc::new(MockLlmProvider::new());
        llm.queue_text(ASK);
        let wf = workflow(llm.clone());
        let mut session = wf.start("help me");

        let report = drive(&wf, &mut session, 7, |_| Ok(String::new())).await;
        assert!(report.report.contains("SOURCES CONSULTED"));
        assert_eq!(clarify_calls(&llm), 1);
        assert!(session.research_brief().is_some());
    }

    #[tokio::test]
    async fn test_round_cap_forces_research() {
        let llm = Arc::new(MockLlmProvider::new());
        for _ in 0..3 {
            llm.queue_text(ASK);
        }
        let wf = workflow(llm.clone());
        let mut session = wf.start("help me");

        let mut asked = 0;
        let report = drive(&wf, &mut session, 2, |question| {
            assert_eq!(question, "Which region?");
            asked += 1;
            Ok("somewhere".to_string())
        })
        .await;

        assert_eq!(asked, 2);
        assert_eq!(clarify_calls(&llm), 3);
        assert_eq!(report.sources, vec!["https://a.example"]);
    }

    #[tokio::test]
    async fn test_unreadable_reply_ends_clarification() {
        let llm = Arc::new(MockLlmProvider::new());
        llm.queue_text(ASK);
        let wf = workflow(llm.clone());
        let mut session = wf.start("help me");

        let mut asked = 0;
        let report = drive(&wf, &mut session, 7, |_| {
            asked += 1;
            anyhow::bail!("stdin closed")
        })
        .await;

        assert_eq!(asked, 1);
        assert_eq!(clarify_calls(&llm), 1);
        assert!(session.research_brief().is_some());
        assert!(report.report.contains("SOURCES CONSULTED"));
    }
}
