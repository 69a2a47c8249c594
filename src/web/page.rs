// src/web/page.rs
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::library::MovieRecord;

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Distinct non-empty directors, sorted.
pub fn director_options(records: &[MovieRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.director.as_deref())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct genres across all records, sorted.
pub fn genre_options(records: &[MovieRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(MovieRecord::genre_list)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn format_rating(rating: Option<f64>) -> String {
    match rating {
        Some(r) => format!("{r:.1}"),
        None => "–".to_string(),
    }
}

fn render_options(out: &mut String, all_label: &str, values: &[String]) {
    let _ = write!(out, r#"<option value="">{}</option>"#, escape_html(all_label));
    for value in values {
        let v = escape_html(value);
        let _ = write!(out, r#"<option value="{v}">{v}</option>"#);
    }
}

fn render_card(out: &mut String, movie: &MovieRecord) {
    let title = escape_html(&movie.title);
    let director = escape_html(movie.director.as_deref().unwrap_or(""));
    let genres = escape_html(movie.genres.as_deref().unwrap_or(""));
    let year = movie.year.map(|y| y.to_string()).unwrap_or_default();
    let rating_attr = movie.rating.map(|r| r.to_string()).unwrap_or_else(|| "0".into());

    let _ = write!(
        out,
        r#"<div class="movie-card" data-title="{title}" data-year="{year}" data-rating="{rating_attr}" data-director="{director}" data-genres="{genres}">"#
    );
    match movie.poster_path.as_deref() {
        Some(poster) => {
            let _ = write!(
                out,
                r#"<img class="poster" src="{}" alt="{title}" loading="lazy">"#,
                escape_html(poster)
            );
        }
        None => out.push_str(r#"<div class="poster placeholder">No poster</div>"#),
    }

    out.push_str(r#"<div class="movie-info">"#);
    if year.is_empty() {
        let _ = write!(out, "<h2>{title}</h2>");
    } else {
        let _ = write!(out, "<h2>{title} ({year})</h2>");
    }
    if !director.is_empty() {
        let _ = write!(out, r#"<p class="director">{director}</p>"#);
    }
    if let Some(countries) = movie.countries.as_deref() {
        let _ = write!(out, r#"<p class="countries">{}</p>"#, escape_html(countries));
    }
    if !genres.is_empty() {
        let _ = write!(out, r#"<p class="genres">{genres}</p>"#);
    }
    let _ = write!(out, r#"<p class="rating">★ {}/10</p>"#, format_rating(movie.rating));
    if let Some(plot) = movie.plot.as_deref() {
        let _ = write!(out, r#"<p class="plot">{}</p>"#, escape_html(plot));
    }
    if let (Some(id), Some(_)) = (movie.id, movie.video_path.as_deref()) {
        let _ = write!(
            out,
            r#"<button class="play-button" onclick="playMovie({id})">▶ Play</button>"#
        );
    }
    out.push_str("</div></div>");
}

const STYLE: &str = r#"
:root[data-theme="dark"] { --bg: #14161a; --card: #1f2329; --text: #e8e8e8; --muted: #9aa3ad; --accent: #e0a84a; }
:root[data-theme="light"] { --bg: #f4f4f6; --card: #ffffff; --text: #1d1f22; --muted: #5d6570; --accent: #b5761b; }
body { margin: 0; padding: 1.5rem; background: var(--bg); color: var(--text); font-family: system-ui, sans-serif; }
.controls { display: flex; flex-wrap: wrap; gap: .75rem; margin-bottom: 1.25rem; align-items: center; }
.controls input, .controls select, .controls button { padding: .4rem .6rem; border-radius: 6px; border: 1px solid var(--muted); background: var(--card); color: var(--text); }
.movie-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 1rem; }
.movie-card { background: var(--card); border-radius: 10px; overflow: hidden; display: flex; flex-direction: column; }
.poster { width: 100%; aspect-ratio: 2 / 3; object-fit: cover; }
.placeholder { display: flex; align-items: center; justify-content: center; color: var(--muted); }
.movie-info { padding: .75rem; }
.movie-info h2 { font-size: 1.05rem; margin: 0 0 .4rem; }
.movie-info p { margin: .2rem 0; color: var(--muted); font-size: .9rem; }
.rating { color: var(--accent) !important; }
.plot { max-height: 6.5em; overflow: hidden; }
.play-button { margin-top: .5rem; background: var(--accent); color: #000; border: 0; border-radius: 6px; padding: .4rem .8rem; cursor: pointer; }
.status { color: var(--muted); }
"#;

const SCRIPT: &str = r#"
let sortDirection = 1;
document.documentElement.setAttribute('data-theme', localStorage.getItem('theme') || 'dark');

function toggleTheme() {
  const root = document.documentElement;
  const next = root.getAttribute('data-theme') === 'dark' ? 'light' : 'dark';
  root.setAttribute('data-theme', next);
  localStorage.setItem('theme', next);
}

function filterMovies() {
  const q = document.getElementById('search').value.toLowerCase();
  const director = document.getElementById('directorFilter').value;
  const genre = document.getElementById('genreFilter').value;
  document.querySelectorAll('.movie-card').forEach(card => {
    const genres = card.dataset.genres.split(',').map(g => g.trim());
    const visible = card.dataset.title.toLowerCase().includes(q)
      && (!director || card.dataset.director === director)
      && (!genre || genres.includes(genre));
    card.style.display = visible ? '' : 'none';
  });
}

function toggleSortDirection() {
  sortDirection *= -1;
  sortMovies();
}

function sortMovies() {
  const key = document.getElementById('sortBy').value;
  const grid = document.querySelector('.movie-grid');
  const cards = Array.from(grid.children);
  cards.sort((a, b) => {
    let x = a.dataset[key], y = b.dataset[key];
    if (key === 'year' || key === 'rating') { x = parseFloat(x) || 0; y = parseFloat(y) || 0; }
    else { x = x.toLowerCase(); y = y.toLowerCase(); }
    return (x < y ? -1 : x > y ? 1 : 0) * sortDirection;
  });
  cards.forEach(c => grid.appendChild(c));
}

function setStatus(text) {
  document.getElementById('status').textContent = text;
}

async function playMovie(id) {
  const resp = await fetch('/play/' + id);
  if (!resp.ok) { setStatus(await resp.text()); }
}

async function refreshLibrary() {
  const button = document.getElementById('refreshButton');
  button.disabled = true;
  setStatus('Scanning library...');
  try {
    const resp = await fetch('/refresh');
    const body = await resp.json();
    if (body.status === 'success') { location.reload(); return; }
    setStatus(body.message);
  } catch (e) {
    setStatus('Refresh failed: ' + e);
  }
  button.disabled = false;
}
"#;

pub fn render_library(records: &[MovieRecord]) -> String {
    let mut out = String::with_capacity(4096 + records.len() * 1024);
    out.push_str(r#"<!DOCTYPE html><html data-theme="dark"><head><meta charset="utf-8">"#);
    out.push_str(r#"<meta name="viewport" content="width=device-width, initial-scale=1">"#);
    out.push_str("<title>Movie Library</title><style>");
    out.push_str(STYLE);
    out.push_str("</style></head><body>");

    let _ = write!(
        out,
        r#"<h1>Movie Library <small class="status">{} movies</small></h1>"#,
        records.len()
    );
    out.push_str(r#"<div class="controls">"#);
    out.push_str(r#"<button onclick="toggleTheme()">Toggle theme</button>"#);
    out.push_str(r#"<button id="refreshButton" onclick="refreshLibrary()">Rescan library</button>"#);
    out.push_str(r#"<input id="search" type="search" placeholder="Search titles" oninput="filterMovies()">"#);

    out.push_str(r#"<select id="directorFilter" onchange="filterMovies()">"#);
    render_options(&mut out, "All directors", &director_options(records));
    out.push_str("</select>");

    out.push_str(r#"<select id="genreFilter" onchange="filterMovies()">"#);
    render_options(&mut out, "All genres", &genre_options(records));
    out.push_str("</select>");

    out.push_str(concat!(
        r#"<select id="sortBy" onchange="sortMovies()">"#,
        r#"<option value="title">Title</option>"#,
        r#"<option value="year">Year</option>"#,
        r#"<option value="rating">Rating</option>"#,
        r#"<option value="director">Director</option>"#,
        "</select>",
        r#"<button onclick="toggleSortDirection()">⇅</button>"#,
        r#"<span id="status" class="status"></span>"#,
    ));
    out.push_str("</div>");

    out.push_str(r#"<div class="movie-grid">"#);
    for movie in records {
        render_card(&mut out, movie);
    }
    out.push_str("</div><script>");
    out.push_str(SCRIPT);
    out.push_str("</script></body></html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, director: Option<&str>, genres: Option<&str>) -> MovieRecord {
        MovieRecord {
            id: Some(7),
            folder_path: format!("/m/{title}"),
            title: title.into(),
            year: Some(2010),
            director: director.map(str::to_string),
            countries: None,
            genres: genres.map(str::to_string),
            rating: Some(8.8),
            plot: None,
            poster_path: None,
            video_path: None,
            tmdb_id: None,
            last_updated: None,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn filter_options_are_distinct_and_sorted() {
        let records = vec![
            record("A", Some("Nolan"), Some("Sci-Fi, Action")),
            record("B", Some("Mann"), Some("Crime, Action")),
            record("C", Some("Nolan"), None),
            record("D", Some("  "), Some("")),
        ];
        assert_eq!(director_options(&records), vec!["Mann", "Nolan"]);
        assert_eq!(genre_options(&records), vec!["Action", "Crime", "Sci-Fi"]);
    }

    #[test]
    fn play_button_only_for_records_with_video() {
        let mut with_video = record("Inception", Some("Christopher Nolan"), None);
        with_video.video_path = Some("/m/Inception/i.mkv".into());
        let html = render_library(&[with_video]);
        assert!(html.contains("playMovie(7)"));
        assert!(html.contains("★ 8.8/10"));

        let html = render_library(&[record("Inception", None, None)]);
        assert!(!html.contains("playMovie(7)"));
        assert!(html.contains("No poster"));
    }

    #[test]
    fn missing_rating_renders_placeholder() {
        let mut r = record("Obscure", None, None);
        r.rating = None;
        r.year = None;
        let html = render_library(&[r]);
        assert!(html.contains("<h2>Obscure</h2>"));
        assert!(html.contains("★ –/10"));
    }
}
