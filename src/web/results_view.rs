// Minimal DOM rendering of the battle results, two panels side by side.
use super::browser_document;
use crate::error::{Error, Result};
use crate::results::{Outcome, PanelStatus, PlayerPanel, ResultsSummary};

pub fn render(container_id: &str, summary: &ResultsSummary) -> Result<()> {
    let doc = browser_document()?;
    let el = doc
        .get_element_by_id(container_id)
        .ok_or_else(|| Error::Js(format!("no element #{container_id}")))?;

    let (local_title, opponent_title) = match summary.outcome {
        Outcome::Win => ("Winner", "Loser"),
        Outcome::Lose => ("Loser", "Winner"),
        Outcome::Draw => ("Draw", "Draw"),
        Outcome::Pending => ("", ""),
    };

    let mut html = String::from("<div class='rb-results'>");
    html.push_str(&panel_html(local_title, &summary.local));
    html.push_str(&panel_html(opponent_title, &summary.opponent));
    html.push_str("</div>");
    if let Some(notice) = &summary.disconnect_notice {
        html.push_str(&format!("<div class='rb-notice'>{}</div>", escape(notice)));
    }
    el.set_inner_html(&html);
    Ok(())
}

fn panel_html(title: &str, panel: &PlayerPanel) -> String {
    let mut html = String::from("<div class='rb-panel'>");
    html.push_str(&format!("<h1>{}</h1>", escape(title)));
    match &panel.avatar_url {
        Some(url) if !url.is_empty() => {
            html.push_str(&format!("<img class='rb-avatar' src='{}'/>", escape(url)));
        }
        _ => html.push_str("<div class='rb-avatar'>&#129395;</div>"),
    }
    html.push_str(&format!("<div class='rb-name'>{}</div>", escape(&panel.display_name)));
    if let Some(counts) = panel.tier_counts {
        for (label, n) in [("excellent", counts.excellent), ("good", counts.good), ("miss", counts.miss)] {
            html.push_str(&format!("<div class='rb-row'><span>{label}</span><b>{n}</b></div>"));
        }
    }
    let score = panel.score.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
    html.push_str(&format!("<hr/><div class='rb-row'><span>TotalScore:</span><b>{score}</b></div>"));
    if panel.status == PanelStatus::Waiting {
        html.push_str("<div class='rb-status'>waiting...</div>");
    }
    html.push_str("</div>");
    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SessionIdentity;
    use crate::score::ScoreState;
    use crate::sync::OpponentState;

    #[test]
    fn names_are_escaped() {
        assert_eq!(escape("<b>'x'</b>"), "&lt;b&gt;&#39;x&#39;&lt;/b&gt;");
    }

    #[test]
    fn placeholder_panel_has_no_rows() {
        let summary =
            ResultsSummary::compose(&SessionIdentity::anonymous(1), &ScoreState::new(), &OpponentState::Waiting);
        let html = panel_html("", &summary.opponent);
        assert!(html.contains("waiting..."));
        assert!(!html.contains("excellent"));
        assert!(html.contains("<b>-</b>"));
    }
}
