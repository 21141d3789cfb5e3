//! Console display of stage reasoning

use serde_json::Value;

const RULE_WIDTH: usize = 48;

/// Frame a stage's JSON output with a centred title bar
pub fn format_agent_reasoning(output: &Value, agent_name: &str) -> String {
    let body = match output {
        // Stages sometimes hand over pre-serialized JSON
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|parsed| serde_json::to_string_pretty(&parsed).ok())
            .unwrap_or_else(|| raw.clone()),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };

    let bar = "=".repeat(10);
    format!(
        "\n{bar} {agent_name:^28} {bar}\n{body}\n{}",
        "=".repeat(RULE_WIDTH)
    )
}

pub fn show_agent_reasoning(output: &Value, agent_name: &str) {
    println!("{}", format_agent_reasoning(output, agent_name));
}

/// Print a titled summary block followed by the framed JSON details
pub fn show_stage_report(title: &str, summary: &str, content: &Value, agent_name: &str) {
    println!("\n==========  {title} Summary  ==========");
    println!("{summary}");
    println!("{}", "=".repeat(50));

    println!("\n==========  {title} Details  ==========");
    show_agent_reasoning(content, agent_name);
}
