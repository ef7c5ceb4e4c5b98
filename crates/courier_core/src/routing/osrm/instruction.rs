/// Human-readable instruction for an OSRM maneuver.
pub fn describe_maneuver(kind: &str, modifier: Option<&str>, exit: Option<u32>) -> String {
    let modifier = modifier.map(str::trim).filter(|m| !m.is_empty());
    match kind {
        "depart" => "Start your journey".to_string(),
        "arrive" => "You have arrived at your destination".to_string(),
        "turn" | "end of road" => match modifier {
            Some(m) => format!("Turn {m}"),
            None => "Turn".to_string(),
        },
        "continue" | "new name" => "Continue straight".to_string(),
        "merge" => "Merge onto the road".to_string(),
        "on ramp" | "on-ramp" => "Take the ramp".to_string(),
        "off ramp" | "off-ramp" => "Take the exit".to_string(),
        "fork" => match modifier {
            Some(m) => format!("Keep {m}"),
            None => "Keep on the main road".to_string(),
        },
        "roundabout" | "rotary" | "roundabout turn" => {
            format!("Take the {} exit", ordinal(exit.unwrap_or(1)))
        }
        _ => "Continue".to_string(),
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
