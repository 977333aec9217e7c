//! System and user prompts for each kind of narrative. Context payloads are
//! embedded as pretty-printed JSON.

use serde::Serialize;

use crate::errors::NarrativeError;
use crate::models::pull_request;

pub const PR_SUMMARY_SYSTEM: &str = "You are an expert senior software engineer reviewing GitHub pull requests. \
Summarize the pull request and produce useful engineering insights for reviewers.";

pub const REPO_ANALYSIS_SYSTEM: &str = "You are an expert software engineering analyst assessing the health of GitHub repositories. \
Base every statement on the metrics you are given.";

pub const WEEKLY_REPORT_SYSTEM: &str = "You are an expert software engineering analyst writing weekly activity reports for GitHub repositories. \
Analyze the last 7 days of activity and provide structured highlights, risks and recommendations.";

pub fn pr_summary(repo_full_name: &str, pr: &pull_request::Model, author: Option<&str>) -> String {
    format!(
        "Repository: {repo}\n\
         PR #{number}\n\
         Author: {author}\n\n\
         Title:\n{title}\n\n\
         Description:\n{body}\n\n\
         Diff Stats:\n\
         Additions: {additions}\n\
         Deletions: {deletions}\n\
         Changed Files: {files}\n\n\
         Respond with a JSON object with these fields:\n\
         - summary: 2-4 sentence summary\n\
         - riskLevel: LOW, MEDIUM or HIGH\n\
         - complexity: integer from 1 to 10\n\
         - keyChanges: list of key changes\n\
         - affectedAreas: list of affected areas or modules\n\
         - recommendedTests: list of recommended test cases\n\
         - reviewerNotes: notes for the reviewer",
        repo = repo_full_name,
        number = pr.number,
        author = author.unwrap_or("Unknown"),
        title = pr.title,
        body = pr.body.as_deref().unwrap_or("(no description)"),
        additions = pr.additions,
        deletions = pr.deletions,
        files = pr.changed_files,
    )
}

pub fn repo_analysis<C: Serialize>(context: &C) -> Result<String, NarrativeError> {
    let payload = serde_json::to_string_pretty(context)?;
    Ok(format!(
        "Repository metrics:\n{payload}\n\n\
         Respond with a JSON object with these fields:\n\
         - healthScore: integer from 0 to 100\n\
         - riskLevel: low, medium or high\n\
         - summary: 2-4 sentence assessment\n\
         - strengths: list of strengths\n\
         - weaknesses: list of weaknesses\n\
         - hotspots: list of {{\"file\": string, \"churn\": integer}} for the riskiest areas\n\
         - contributorInsights: list of observations about contributors\n\
         - recommendations: list of actionable recommendations"
    ))
}

pub fn weekly_report<C: Serialize>(context: &C) -> Result<String, NarrativeError> {
    let payload = serde_json::to_string_pretty(context)?;
    Ok(format!(
        "Activity for the last 7 days:\n{payload}\n\n\
         Respond with a JSON object with these fields:\n\
         - highlights: 3-5 key highlights of the week\n\
         - keyPRs: up to 5 of the most important PRs as {{\"id\": PR number, \"title\": string}}\n\
         - keyIssues: up to 5 of the most important issues as {{\"id\": issue number, \"title\": string}}\n\
         - activeContributors: logins of the most active contributors\n\
         - riskAlerts: 2-4 potential risks or concerns\n\
         - velocitySummary: 2-3 sentences on development velocity and trends\n\
         - suggestedNextSteps: 3-5 actionable next steps"
    ))
}
