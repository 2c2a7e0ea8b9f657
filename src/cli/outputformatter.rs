use serde_json::Value;
use terminal_size::{terminal_size, Height, Width};

// Render a list of row objects (as returned under "rows" by the server) as an
// ASCII table sized to the terminal. Returns true if a table was printed,
// false when the shape was not tabular (caller falls back to raw JSON).
pub fn print_rows(rows: &[Value]) -> bool {
    if rows.is_empty() {
        println!("(no rows)");
        return true;
    }

    // Column order: union of keys in first-seen order across all rows.
    let mut cols: Vec<String> = Vec::new();
    for row in rows {
        let Value::Object(map) = row else { return false };
        for k in map.keys() {
            if !cols.contains(k) {
                cols.push(k.clone());
            }
        }
    }
    if cols.is_empty() {
        return false;
    }

    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            cols.iter()
                .map(|c| row.get(c).map(to_cell_string).unwrap_or_default())
                .collect()
        })
        .collect();

    let termw = get_terminal_width();
    crate::tprintln!("[cli.outputformatter] detected terminal width={} columns", termw);

    let mut widths: Vec<usize> = cols.iter().map(|s| s.chars().count().min(termw)).collect();
    for r in &table {
        for (i, cell) in r.iter().enumerate() {
            let w = cell.chars().count();
            if w > widths[i] {
                widths[i] = w.min(termw);
            }
        }
    }

    let sep = build_separator(&widths);
    println!("{}", fit(&sep, termw));
    println!("{}", fit(&build_row(&cols, &widths), termw));
    println!("{}", fit(&sep, termw));
    for r in &table {
        println!("{}", fit(&build_row(r, &widths), termw));
    }
    println!("{}", fit(&sep, termw));
    println!("rows: {}", table.len());
    true
}

fn to_cell_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let text = truncate(&cell, *w);
        s.push(' ');
        if is_numeric_like(&cell) {
            let pad = w.saturating_sub(text.chars().count());
            s.push_str(&" ".repeat(pad));
            s.push_str(&text);
        } else {
            s.push_str(&text);
            let pad = w.saturating_sub(text.chars().count());
            s.push_str(&" ".repeat(pad));
        }
        s.push(' ');
        s.push('|');
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max {
        return s.to_string();
    }
    if max <= 1 {
        return "…".to_string();
    }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    // crude detection for aligning numbers to the right
    let st = s.trim();
    if st.is_empty() {
        return false;
    }
    let mut has_digit = false;
    for ch in st.chars() {
        if ch.is_ascii_digit() {
            has_digit = true;
            continue;
        }
        if ".-+".contains(ch) {
            continue;
        }
        return false;
    }
    has_digit
}

fn get_terminal_width() -> usize {
    if let Some((Width(w), Height(_h))) = terminal_size() {
        return (w.saturating_sub(4)) as usize;
    }
    80
}

fn fit(s: &str, maxw: usize) -> String {
    if s.chars().count() <= maxw {
        return s.to_string();
    }
    let mut out: String = s.chars().take(maxw.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_rows_fall_back_to_json() {
        assert!(!print_rows(&[json!([1, 2, 3])]));
    }

    #[test]
    fn object_rows_render() {
        let rows = vec![
            json!({"patient_id": 1, "name": "Rhea Kapoor"}),
            json!({"patient_id": 2, "name": "Omar Haddad", "contact": null}),
        ];
        assert!(print_rows(&rows));
    }

    #[test]
    fn numeric_alignment_detection() {
        assert!(is_numeric_like("42"));
        assert!(is_numeric_like("-3.5"));
        assert!(!is_numeric_like("x-ray"));
        assert!(!is_numeric_like(""));
    }

    #[test]
    fn truncate_keeps_width() {
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("hello world", 6), "hello…");
        assert_eq!(truncate("hello", 1), "…");
    }
}
