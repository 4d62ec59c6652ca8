//! The research director hierarchy.
//!
//! ```text
//!                 Research Director Agent
//!          (tool_choice = required, plans the run)
//!        ┌──────────────┼────────────────────┐
//!        ▼              ▼                    ▼
//! facts_finder_tool  source_checker_tool  report_writer_tool
//!   Facts Finding    Source Verification  Research Synthesis
//!     [search]          [search]             (no tools)
//! ```
//!
//! Phase ordering (plan, find, verify, write) lives only in the director's
//! instructions. The loop enforces none of it.

use std::collections::HashMap;
use std::sync::Arc;

use deepdive_config::AgentOverride;
use deepdive_core::agent::{AgentDefinition, SamplingConfig, ToolChoice};
use deepdive_core::error::RegistryError;
use deepdive_core::tool::{AgentTool, ToolRef};

/// Config keys for `[agents.<key>]` overrides.
pub const DIRECTOR: &str = "director";
pub const FACTS_FINDER: &str = "facts_finder";
pub const SOURCE_CHECKER: &str = "source_checker";
pub const REPORT_WRITER: &str = "report_writer";

pub const FACTS_FINDER_INSTRUCTIONS: &str = "\
You are a fact-finding agent working on one research sub-question.

Goal: gather accurate, well-sourced facts that answer the question in depth.

How to work:
- Break the question into three to five angles and search for each one.
- Prefer academic, governmental and established institutional sources.
- Confirm important claims with more than one source and note disagreements.
- Capture trends, comparisons and relationships, not only isolated facts.
- Add historical or technical background where it helps.

For every finding, report on its own line:
- the fact
- its source, with publication date
- your confidence (High, Medium or Low) given source quality and agreement
- any context a reader needs";

pub const SOURCE_CHECKER_INSTRUCTIONS: &str = "\
You are a source verification agent. You judge how far a reader can trust
the sources behind a set of findings.

Assess each source on:
1. Authority: author credentials, publisher reputation, venue standing.
2. Method: how the data was collected and analysed, sample size.
3. Objectivity: funding, conflicts of interest, one-sided framing.
4. Currency: publication date, citations, relevance to the question.
5. Corroboration: agreement with other reputable sources, expert consensus.

Rate each source:
- A: peer-reviewed research, official statistics, major institutions
- B: established media, industry white papers, recognised experts
- C: organisational reports, lesser-known experts, some blogs
- D: unverified, visibly biased or outdated material

For each source give its rating, main strengths and weaknesses, how much
weight it deserves in the final report, and any bias to keep in mind.";

pub const REPORT_WRITER_INSTRUCTIONS: &str = "\
You are a research synthesis agent. Turn verified findings into a complete
research report with these sections:

1. Executive summary: the question, the key findings, the main conclusions.
2. Methodology: search strategy, sources consulted, how they were rated,
   limits of the approach.
3. Key findings: grouped by theme, combining facts from several verified
   sources, separating settled facts from open debate.
4. Analysis: patterns, trends, comparisons, gaps and contradictions.
5. Conclusions: evidence-based answers, implications, further research.
6. References: full citations grouped by source rating.

Write precisely and in an academic register, use clear headings, and
attribute every claim. Cite as [Author, Date] [Rating: A-D] [credibility note].";

pub const DIRECTOR_INSTRUCTIONS: &str = "\
You are a research director. You coordinate specialist agents and deliver
the report produced by report_writer_tool.

Process:
1. Planning: split the research question into several focused sub-questions.
2. Fact finding: send each sub-question to facts_finder_tool. You may issue
   these calls together and wait for all of them.
3. Verification: pass the findings to source_checker_tool and wait for the
   assessments.
4. Reporting: once verification is done, send the findings and their
   assessments to report_writer_tool.

Make sure every phase receives the output of the one before it and that the
final answer is the report returned by report_writer_tool.";

/// Apply the `[agents.<key>]` override, if any, to a built-in agent.
fn configure(
    definition: AgentDefinition,
    key: &str,
    overrides: &HashMap<String, AgentOverride>,
) -> AgentDefinition {
    let Some(over) = overrides.get(key) else {
        return definition;
    };

    let sampling = over.apply(definition.sampling);
    let mut definition = definition.with_sampling(sampling);
    if let Some(model) = &over.model {
        definition = definition.with_model(model);
    }
    if let Some(max_turns) = over.max_turns {
        definition = definition.with_max_turns(max_turns);
    }
    definition
}

/// The Facts Finding Agent.
pub fn facts_finder(
    search: ToolRef,
    overrides: &HashMap<String, AgentOverride>,
) -> Result<AgentDefinition, RegistryError> {
    let definition = AgentDefinition::new("Facts Finding Agent", FACTS_FINDER_INSTRUCTIONS)
        .with_description("Deep research tool for comprehensive fact finding")
        .with_sampling(SamplingConfig::new(0.1, 800))
        .with_tool(search)?;
    Ok(configure(definition, FACTS_FINDER, overrides))
}

/// The Source Verification Agent.
pub fn source_checker(
    search: ToolRef,
    overrides: &HashMap<String, AgentOverride>,
) -> Result<AgentDefinition, RegistryError> {
    let definition =
        AgentDefinition::new("Source Verification Agent", SOURCE_CHECKER_INSTRUCTIONS)
            .with_description("Comprehensive source verification tool")
            .with_sampling(SamplingConfig::new(0.2, 600))
            .with_tool(search)?;
    Ok(configure(definition, SOURCE_CHECKER, overrides))
}

/// The Research Synthesis Agent. It has no tools.
pub fn report_writer(overrides: &HashMap<String, AgentOverride>) -> AgentDefinition {
    let definition = AgentDefinition::new("Research Synthesis Agent", REPORT_WRITER_INSTRUCTIONS)
        .with_description("Research synthesis and report generation tool")
        .with_sampling(SamplingConfig::new(0.3, 2000));
    configure(definition, REPORT_WRITER, overrides)
}

/// Build the Research Director Agent and the three agents beneath it.
///
/// `search` is shared by the fact-finding and verification agents.
pub fn build_director(
    search: ToolRef,
    overrides: &HashMap<String, AgentOverride>,
) -> Result<AgentDefinition, RegistryError> {
    let facts = Arc::new(facts_finder(search.clone(), overrides)?);
    let sources = Arc::new(source_checker(search, overrides)?);
    let writer = Arc::new(report_writer(overrides));

    let tools = [
        ToolRef::Agent(AgentTool::new(
            "report_writer_tool",
            writer.description.clone(),
            "data",
            writer,
        )),
        ToolRef::Agent(AgentTool::new(
            "facts_finder_tool",
            facts.description.clone(),
            "query",
            facts,
        )),
        ToolRef::Agent(AgentTool::new(
            "source_checker_tool",
            sources.description.clone(),
            "query",
            sources,
        )),
    ];

    let definition = AgentDefinition::new("Research Director Agent", DIRECTOR_INSTRUCTIONS)
        .with_description("Coordinates the research process and returns the final report")
        .with_sampling(SamplingConfig::new(0.2, 2000).with_tool_choice(ToolChoice::Required))
        .with_tools(tools)?;
    Ok(configure(definition, DIRECTOR, overrides))
}
