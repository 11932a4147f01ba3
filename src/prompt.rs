use crate::models::Context;

const PREAMBLE: &str = "You are an experienced school guidance counselor advising a guidance office \
on evidence-based interventions for student behavior and academic issues.";

const RESPONSE_SHAPE: &str = r#"Respond with ONLY a JSON object, no markdown and no extra text, in exactly this shape:
{
  "severity": "low" | "medium" | "high",
  "root_cause": "short analysis of the likely root cause",
  "solutions": [
    {
      "title": "name of the intervention",
      "steps": ["concrete step", "concrete step"],
      "impact": "expected impact on students"
    }
  ],
  "quick_wins": ["action that can start this week"]
}
Provide 2 to 3 entries in "solutions"."#;

pub fn build_prompt(issue: &str, context: &Context) -> String {
    let mut prompt = format!("{PREAMBLE}\n\nTrending issue this week: {issue}\n");

    if !context.is_empty() {
        // serde_json maps of Values always serialize
        let rendered = serde_json::to_string_pretty(context).unwrap_or_default();
        prompt.push_str(&format!("\nAdditional context:\n{rendered}\n"));
    }

    prompt.push('\n');
    prompt.push_str(RESPONSE_SHAPE);

    prompt
}
