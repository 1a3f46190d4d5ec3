use crate::models::{CategoryView, DashboardView, PersonView, ProgressMeter};

pub fn render_index(title: &str, view: &DashboardView) -> String {
    let title = escape_html(title);
    let updated = escape_html(&view.generated_at);
    let cards: String = view.people.iter().map(render_person).collect();
    fill_template(
        INDEX_HTML,
        &[
            ("{{TITLE}}", title.as_str()),
            ("{{UPDATED}}", updated.as_str()),
            ("{{CARDS}}", cards.as_str()),
        ],
    )
}

/// Single pass over `template`; substituted text is never scanned again.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        filled.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                filled.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                filled.push_str("{{");
                rest = &tail[2..];
            }
        }
    }
    filled.push_str(rest);
    filled
}

fn render_person(person: &PersonView) -> String {
    let name = escape_html(&person.person);
    let rows: String = person
        .categories
        .iter()
        .map(|category| render_category(&name, category))
        .collect();

    format!(
        r#"<section class="card" data-id="{id}">
  <h2>{name}</h2>
  {rows}
  <div class="meter total">
    <div class="meter-head"><span class="label">Total</span>{summary}</div>
    {bar}
  </div>
</section>
"#,
        id = person.id,
        summary = render_summary(&person.total),
        bar = render_bar(&person.total),
    )
}

fn render_category(name: &str, category: &CategoryView) -> String {
    let column = category.category.column();
    format!(
        r#"<div class="meter {column}">
    <div class="meter-head"><span class="label">{label}</span>{summary}</div>
    {bar}
    <div class="controls">
      <form method="post" action="/progress" data-person="{name}" data-category="{column}" data-delta="-1">
        <input type="hidden" name="person" value="{name}" />
        <input type="hidden" name="category" value="{column}" />
        <input type="hidden" name="delta" value="-1" />
        <button class="btn-sub" type="submit">-</button>
      </form>
      <form method="post" action="/progress" data-person="{name}" data-category="{column}" data-delta="1">
        <input type="hidden" name="person" value="{name}" />
        <input type="hidden" name="category" value="{column}" />
        <input type="hidden" name="delta" value="1" />
        <button class="btn-add" type="submit">+</button>
      </form>
    </div>
  </div>"#,
        label = escape_html(category.label),
        summary = render_summary(&category.meter),
        bar = render_bar(&category.meter),
    )
}

fn render_summary(meter: &ProgressMeter) -> String {
    format!(
        r#"<span class="summary">{} / {} ({}%)</span>"#,
        meter.current, meter.goal, meter.percentage
    )
}

fn render_bar(meter: &ProgressMeter) -> String {
    format!(
        r#"<div class="bar"><div class="fill" style="width: {}%"></div></div>"#,
        meter.percentage
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    :root {
      --bg: #0f172a;
      --card: #1e293b;
      --ink: #f1f5f9;
      --muted: #94a3b8;
      --track: #334155;
      --gold: #facc15;
      --movies: #3b82f6;
      --workouts: #22c55e;
      --match-sets: #ef4444;
      --total: #facc15;
      --shadow: 0 24px 60px rgba(0, 0, 0, 0.35);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Inter", "Trebuchet MS", sans-serif;
      padding: 32px 18px 48px;
    }

    h1 {
      text-align: center;
      color: var(--gold);
      font-size: clamp(1.8rem, 4vw, 2.6rem);
      margin: 0 0 8px;
    }

    .subtitle {
      text-align: center;
      color: var(--muted);
      margin: 0 0 36px;
      font-size: 0.9rem;
    }

    .grid {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(300px, 1fr));
      gap: 28px;
      max-width: 980px;
      margin: 0 auto;
    }

    .card {
      background: var(--card);
      border: 1px solid var(--track);
      border-radius: 18px;
      box-shadow: var(--shadow);
      padding: 24px;
    }

    .card h2 {
      text-align: center;
      margin: 0 0 24px;
      font-size: 1.8rem;
    }

    .meter {
      margin-bottom: 26px;
    }

    .meter-head {
      display: flex;
      justify-content: space-between;
      align-items: flex-end;
      margin-bottom: 8px;
    }

    .label {
      font-weight: 600;
    }

    .summary {
      color: var(--muted);
      font-size: 0.85rem;
    }

    .bar {
      width: 100%;
      height: 20px;
      background: var(--track);
      border-radius: 999px;
      overflow: hidden;
    }

    .fill {
      height: 100%;
      border-radius: 999px;
      transition: width 500ms ease-out;
    }

    .movies .fill { background: var(--movies); }
    .workouts .fill { background: var(--workouts); }
    .match_sets .fill { background: var(--match-sets); }
    .total .fill { background: var(--total); }

    .controls {
      display: flex;
      justify-content: flex-end;
      gap: 8px;
      margin-top: 10px;
    }

    .controls form {
      margin: 0;
    }

    button {
      appearance: none;
      border: none;
      border-radius: 8px;
      padding: 6px 14px;
      font-size: 1rem;
      font-weight: 600;
      cursor: pointer;
      transition: transform 150ms ease;
    }

    button:active {
      transform: scale(0.96);
    }

    .btn-sub {
      background: var(--track);
      color: var(--ink);
    }

    .btn-add {
      background: var(--ink);
      color: var(--bg);
    }

    .status {
      text-align: center;
      color: var(--muted);
      font-size: 0.8rem;
      margin-top: 28px;
    }

    .status[data-type="error"] {
      color: var(--match-sets);
    }
  </style>
</head>
<body>
  <h1>{{TITLE}}</h1>
  <p class="subtitle">Last update <span id="updated">{{UPDATED}}</span></p>
  <main class="grid" id="cards">
{{CARDS}}
  </main>
  <p class="status" id="status"></p>

  <script>
    const cardsEl = document.getElementById('cards');
    const updatedEl = document.getElementById('updated');
    const statusEl = document.getElementById('status');

    const setStatus = (message, type) => {
      statusEl.textContent = message;
      statusEl.dataset.type = type || '';
    };

    const el = (tag, className, text) => {
      const node = document.createElement(tag);
      if (className) {
        node.className = className;
      }
      if (text !== undefined) {
        node.textContent = text;
      }
      return node;
    };

    const meterHead = (label, meter) => {
      const head = el('div', 'meter-head');
      head.append(
        el('span', 'label', label),
        el('span', 'summary', `${meter.current} / ${meter.goal} (${meter.percentage}%)`)
      );
      return head;
    };

    const meterBar = (meter) => {
      const bar = el('div', 'bar');
      const fill = el('div', 'fill');
      fill.style.width = `${meter.percentage}%`;
      bar.append(fill);
      return bar;
    };

    const button = (person, category, delta) => {
      const form = el('form');
      form.dataset.person = person;
      form.dataset.category = category;
      form.dataset.delta = String(delta);
      const btn = el('button', delta > 0 ? 'btn-add' : 'btn-sub', delta > 0 ? '+' : '-');
      btn.type = 'submit';
      form.append(btn);
      return form;
    };

    const renderPerson = (person) => {
      const card = el('section', 'card');
      card.dataset.id = person.id;
      card.append(el('h2', '', person.person));
      person.categories.forEach((category) => {
        const meter = el('div', `meter ${category.category}`);
        const controls = el('div', 'controls');
        controls.append(
          button(person.person, category.category, -1),
          button(person.person, category.category, 1)
        );
        meter.append(meterHead(category.label, category), meterBar(category), controls);
        card.append(meter);
      });
      const total = el('div', 'meter total');
      total.append(meterHead('Total', person.total), meterBar(person.total));
      card.append(total);
      return card;
    };

    const render = (view) => {
      updatedEl.textContent = view.generated_at;
      cardsEl.replaceChildren(...view.people.map(renderPerson));
    };

    const send = async (person, category, delta) => {
      const res = await fetch('/api/progress', {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify({ person, category, delta })
      });
      if (!res.ok) {
        const msg = await res.text();
        throw new Error(msg || 'Request failed');
      }
    };

    cardsEl.addEventListener('submit', (event) => {
      const form = event.target;
      if (!form.dataset || !form.dataset.person) {
        return;
      }
      event.preventDefault();
      send(form.dataset.person, form.dataset.category, Number(form.dataset.delta))
        .then(() => setStatus('', ''))
        .catch((err) => setStatus(err.message, 'error'));
    });

    const events = new EventSource('/api/events');
    events.addEventListener('progress', (event) => {
      render(JSON.parse(event.data));
      setStatus('', '');
    });
    events.addEventListener('error', () => setStatus('Live updates paused, reconnecting...', 'error'));
    window.addEventListener('pagehide', () => events.close());
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProgressRecord;
    use crate::stats::build_dashboard;

    #[test]
    fn renders_one_card_per_person() {
        let records = vec![
            ProgressRecord {
                movies: 42,
                ..ProgressRecord::new(1, "Ada")
            },
            ProgressRecord::new(2, "Grace"),
        ];
        let html = render_index("Challenge", &build_dashboard(&records));

        assert_eq!(html.matches(r#"<section class="card""#).count(), 2);
        assert!(html.contains("<title>Challenge</title>"));
        assert!(html.contains("42 / 100 (42%)"));
        assert!(html.contains("42 / 300 (14%)"));
        assert!(!html.contains("{{"));
        assert!(html.contains("<h2>Ada</h2>"));
    }

    #[test]
    fn placeholders_in_title_are_not_expanded() {
        let records = vec![ProgressRecord::new(1, "{{TITLE}}")];
        let html = render_index("{{CARDS}} {{UPDATED}}", &build_dashboard(&records));

        assert!(html.contains("<title>{{CARDS}} {{UPDATED}}</title>"));
        assert_eq!(html.matches(r#"<section class="card""#).count(), 1);
        assert!(html.contains("<h2>{{TITLE}}</h2>"));
    }

    #[test]
    fn escapes_names() {
        let records = vec![ProgressRecord::new(1, "<b>\"Eve\"</b>")];
        let html = render_index("A & B", &build_dashboard(&records));

        assert!(html.contains("&lt;b&gt;&quot;Eve&quot;&lt;/b&gt;"));
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(!html.contains("<b>\"Eve\"</b>"));
    }
}
