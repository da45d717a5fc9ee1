//! Search estimates for a difficulty threshold

/// Probability that at least one match was found after `attempts` candidates
pub fn probability_found(expected_attempts: f64, attempts: u64) -> f64 {
    if expected_attempts > 0.0 {
        1.0 - (-(attempts as f64) / expected_attempts).exp()
    } else {
        0.0
    }
}

/// Format difficulty as human-readable string
pub fn format_difficulty(difficulty: f64) -> String {
    if difficulty >= 1e15 {
        format!("{:.2}P", difficulty / 1e15)
    } else if difficulty >= 1e12 {
        format!("{:.2}T", difficulty / 1e12)
    } else if difficulty >= 1e9 {
        format!("{:.2}G", difficulty / 1e9)
    } else if difficulty >= 1e6 {
        format!("{:.2}M", difficulty / 1e6)
    } else if difficulty >= 1e3 {
        format!("{:.2}K", difficulty / 1e3)
    } else {
        format!("{:.0}", difficulty)
    }
}

/// Format a candidates-per-second rate
pub fn format_rate(rate: f64) -> String {
    if rate >= 1e9 {
        format!("{:.2} Gc/s", rate / 1e9)
    } else if rate >= 1e6 {
        format!("{:.2} Mc/s", rate / 1e6)
    } else if rate >= 1e3 {
        format!("{:.2} Kc/s", rate / 1e3)
    } else {
        format!("{:.0} c/s", rate)
    }
}

/// Estimate time to 50% probability of finding a match
pub fn estimate_time_50pct(difficulty: f64, rate: f64) -> f64 {
    // For large difficulty, ln(0.5) / ln(1 - 1/difficulty) approximates difficulty * ln(2)
    if rate <= 0.0 {
        return f64::INFINITY;
    }
    (difficulty * std::f64::consts::LN_2) / rate
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() {
        "never".to_string()
    } else if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let mins = seconds / 60.0;
        format!("{:.1}m", mins)
    } else if seconds < 86400.0 {
        let hours = seconds / 3600.0;
        format!("{:.1}h", hours)
    } else if seconds < 86400.0 * 365.0 {
        let days = seconds / 86400.0;
        format!("{:.1}d", days)
    } else {
        let years = seconds / (86400.0 * 365.0);
        format!("{:.1}y", years)
    }
}
