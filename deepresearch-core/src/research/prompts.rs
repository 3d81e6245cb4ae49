//! Prompt templates for each stage.

pub fn clarify_prompt(conversation: &str) -> String {
    format!(
        "Analyze this conversation: {conversation}

Think step by step:
1. Is the research request clear and specific?
2. What key information might be missing?
3. Can research begin or do we need clarification?

Determine if there is sufficient information to begin research.
If information is missing, ask ONE specific clarifying question.
If sufficient information exists, provide a verification message."
    )
}

pub fn brief_prompt(conversation: &str) -> String {
    format!(
        "Transform this conversation into a clear research brief: {conversation}

Think step by step:
1. What is the core research question?
2. What are the key focus areas?
3. What is the scope and boundaries?

The research brief should clearly state the research question, specify key focus areas, and define scope."
    )
}

pub fn plan_prompt(brief: &str) -> String {
    format!(
        "Create a research plan for: {brief}

Think step by step:
1. What topics need to be covered comprehensively?
2. What specific search queries will find the best information?
3. How should queries be structured for maximum relevance?

Generate 5-7 specific search queries and identify key topics."
    )
}

pub fn synthesis_prompt(brief: &str, key_topics: &[String], raw_notes: &str) -> String {
    format!(
        "Research Brief: {brief}
Key Topics: {topics}
Raw Research Data:
{raw_notes}

Think step by step:
1. What are the main themes and patterns in this data?
2. What specific facts, numbers, names, and examples are most valuable?
3. How should this information be organized for clarity?
4. What actionable details must be preserved?

Synthesize this information into comprehensive, well-structured notes.
Extract ALL specific, actionable details including:
- Names of companies, products, people, places, organizations
- Exact numbers, statistics, dates, prices, measurements
- Addresses, locations, contact information
- URLs, website links, booking platforms
- Step-by-step processes or instructions
- Pros and cons, comparisons, rankings
- Expert recommendations and best practices
- Time-sensitive information (hours, schedules, deadlines)

Organize the notes by topic and preserve all specific details that would be useful to someone acting on this research.",
        topics = key_topics.join(", "),
    )
}

/// Writer prompt. A non-empty `feedback` asks for a revision addressing it.
pub fn writer_prompt(brief: &str, notes: &str, feedback: &str) -> String {
    let feedback_section = if feedback.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nPREVIOUS CRITIQUE TO ADDRESS:\n{feedback}\n\nPlease revise the report addressing all critique points."
        )
    };

    format!(
        "You are an expert research analyst creating a comprehensive report.

Research Brief: {brief}

Synthesized Research Notes:
{notes}
{feedback_section}

Think step by step:
1. What is the best structure to present this information clearly?
2. What are the most important findings to highlight?
3. How can I make this maximally actionable and detailed?
4. Have I included all specific data points and examples?

Create a detailed, actionable research report with the following structure:

1. TITLE: Create a clear, descriptive title

2. EXECUTIVE SUMMARY: Provide a concise 3-4 sentence overview of the research findings

3. KEY FINDINGS: List 7-10 most important discoveries with specific details (names, numbers, links)

4. DETAILED ANALYSIS: Write 5-7 comprehensive paragraphs organized by themes/topics. Include:
   - All specific names, brands, products, services mentioned
   - Exact numbers, prices, statistics, percentages
   - Step-by-step processes or how-to information
   - Comparisons and rankings
   - Expert opinions and recommendations
   - Time-sensitive details (dates, schedules, hours)
   - Contact information and locations where relevant

5. PRACTICAL RECOMMENDATIONS: Provide 5-7 actionable next steps or recommendations based on the research

6. IMPORTANT RESOURCES: List specific websites, tools, platforms, or contacts discovered

7. CONCLUSION: Summarize key takeaways and final thoughts

Make the report comprehensive and include every useful specific detail from the research. Format it clearly with proper sections."
    )
}

pub fn critique_prompt(brief: &str, draft: &str) -> String {
    format!(
        "You are a critical reviewer evaluating a research report for quality, completeness, and actionability.

Research Brief: {brief}

Draft Report:
{draft}

Think step by step (reflection):
1. Does this report fully answer the research question with sufficient depth?
2. Are there any missing details, information gaps, or unclear sections?
3. Is the structure logical, well-organized, and easy to follow?
4. Are specific examples, data points, numbers, and sources provided throughout?
5. Is this report actionable with concrete recommendations?
6. Does it meet professional research report standards?

Evaluate the report and determine if revision is needed. Be thorough but fair."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_prompt_feedback_section() {
        let first = writer_prompt("brief", "notes", "");
        assert!(!first.contains("PREVIOUS CRITIQUE"));

        let revision = writer_prompt("brief", "notes", "Issues identified:\n- thin");
        assert!(revision.contains("PREVIOUS CRITIQUE TO ADDRESS:\nIssues identified:\n- thin"));
        assert!(revision.contains("Please revise the report addressing all critique points."));
    }

    #[test]
    fn test_synthesis_prompt_joins_topics() {
        let prompt = synthesis_prompt(
            "Denver hikes",
            &["trails".to_string(), "parking".to_string()],
            "Source: x\ncontent",
        );
        assert!(prompt.starts_with("Research Brief: Denver hikes\nKey Topics: trails, parking\n"));
        assert!(prompt.contains("Raw Research Data:\nSource: x\ncontent"));
    }

    #[test]
    fn test_prompts_embed_inputs() {
        assert!(clarify_prompt("user: help me").contains("Analyze this conversation: user: help me"));
        assert!(brief_prompt("user: q").contains("clear research brief: user: q"));
        assert!(plan_prompt("the brief").starts_with("Create a research plan for: the brief"));
        assert!(critique_prompt("b", "the draft").contains("Draft Report:\nthe draft"));
    }
}
