use crate::fetch::{Notices, Severity};
use crate::tmdb::MovieSummary;

const OVERVIEW_LIMIT: usize = 200;

/// One rendered row: the recommendation plus its (optional) poster.
pub struct RecommendationView {
    pub movie: MovieSummary,
    pub poster_url: Option<String>,
}

// The ellipsis is appended even when nothing was cut; long-standing display
// behavior, kept as-is.
pub fn short_overview(overview: &str) -> String {
    let cut: String = overview.chars().take(OVERVIEW_LIMIT).collect();
    format!("{}...", cut)
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

pub fn page(search_title: &str, notices: &Notices, results: &[RecommendationView]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Movie Recommendation System</title>\n");
    html.push_str(
        "<style>body{font-family:sans-serif;max-width:720px;margin:2rem auto;padding:0 1rem}\
.warning{color:#8a6d3b}.error{color:#a94442}\
.movie{display:flex;gap:1rem;margin:1rem 0}.movie img{width:150px;height:auto}</style>\n",
    );
    html.push_str("</head>\n<body>\n<h1>Movie Recommendation System</h1>\n");
    html.push_str("<form action=\"/recommend\" method=\"get\">\n");
    html.push_str(&format!(
        "<input type=\"text\" name=\"title\" value=\"{}\" placeholder=\"Enter a movie name\">\n",
        escape(search_title)
    ));
    html.push_str("<button type=\"submit\">Recommend</button>\n</form>\n");

    for notice in notices.iter() {
        let class = match notice.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        html.push_str(&format!(
            "<p class=\"{}\">{}</p>\n",
            class,
            escape(&notice.message)
        ));
    }

    if !results.is_empty() {
        html.push_str("<h2>Recommended Movies:</h2>\n");
        for entry in results {
            html.push_str("<div class=\"movie\">\n");
            match &entry.poster_url {
                Some(url) => html.push_str(&format!(
                    "<img src=\"{}\" alt=\"Poster for {}\">\n",
                    escape(url),
                    escape(&entry.movie.title)
                )),
                None => html.push_str("<p>No poster available</p>\n"),
            }
            html.push_str("<div>\n");
            html.push_str(&format!(
                "<p><strong>{}</strong> ({})</p>\n",
                escape(&entry.movie.title),
                escape(&entry.movie.release_year)
            ));
            html.push_str(&format!("<p>Rating: {}</p>\n", entry.movie.rating));
            html.push_str(&format!(
                "<p>{}</p>\n",
                escape(&short_overview(&entry.movie.overview))
            ));
            html.push_str("</div>\n</div>\n<hr>\n");
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}
