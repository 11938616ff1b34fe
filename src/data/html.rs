use crate::error::{Error, Result};
use scraper::{ElementRef, Html, Selector};

/// A table lifted out of an HTML page: header text plus cell text per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("bad CSS selector {css:?}: {e}")))
}

fn element_text(el: &ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the `href` of the first anchor whose text contains `text`.
pub fn find_link(html: &str, text: &str) -> Result<Option<String>> {
    let doc = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    Ok(doc
        .select(&anchors)
        .find(|a| element_text(a).contains(text))
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string))
}

/// Collects `(name, value)` for every hidden input inside the matching form.
///
/// The supply search is an ASP.NET form, so it carries a request
/// verification token that has to be posted back with the search.
pub fn hidden_inputs(html: &str, form_selector: &str) -> Result<Vec<(String, String)>> {
    let doc = Html::parse_document(html);
    let hidden = selector(&format!("{form_selector} input[type=\"hidden\"]"))?;

    Ok(doc
        .select(&hidden)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or("");
            Some((name.to_string(), value.to_string()))
        })
        .collect())
}

/// Extracts every table matching `table_selector`, in document order.
///
/// Headers come from `th` cells (the first row that has any), data rows from
/// rows of `td` cells. Rows without `td` cells are skipped.
pub fn extract_tables(html: &str, table_selector: &str) -> Result<Vec<HtmlTable>> {
    let doc = Html::parse_document(html);
    let tables = selector(table_selector)?;
    let rows = selector("tr")?;
    let th = selector("th")?;
    let td = selector("td")?;

    let mut out = Vec::new();
    for table in doc.select(&tables) {
        let mut parsed = HtmlTable::default();
        for row in table.select(&rows) {
            let header_cells: Vec<String> = row.select(&th).map(|c| element_text(&c)).collect();
            if parsed.headers.is_empty() && !header_cells.is_empty() {
                parsed.headers = header_cells;
                continue;
            }
            let cells: Vec<String> = row.select(&td).map(|c| element_text(&c)).collect();
            if !cells.is_empty() {
                parsed.rows.push(cells);
            }
        }
        out.push(parsed);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRADE_PAGE: &str = r#"
        <html><body>
          <a href="/other.pdf">Native vegetation guidelines</a>
          <p>Downloads</p>
          <a href="/__data/assets/excel_doc/0001/traded.xlsx">
             Traded credits   information (XLSX, 120 KB)
          </a>
        </body></html>"#;

    #[test]
    fn test_find_link_matches_collapsed_text() {
        let href = find_link(TRADE_PAGE, "Traded credits information").unwrap();
        assert_eq!(
            href.as_deref(),
            Some("/__data/assets/excel_doc/0001/traded.xlsx")
        );
    }

    #[test]
    fn test_find_link_missing() {
        assert_eq!(find_link(TRADE_PAGE, "Supply report").unwrap(), None);
    }

    #[test]
    fn test_hidden_inputs_scoped_to_form() {
        let html = r#"
            <form id="Other"><input type="hidden" name="ignored" value="x"></form>
            <form id="GeneralGuidelineSearch">
              <input type="hidden" name="__RequestVerificationToken" value="abc123">
              <input type="hidden" name="Mode">
              <input type="text" name="GHU" value="">
            </form>"#;
        let fields = hidden_inputs(html, "#GeneralGuidelineSearch").unwrap();
        assert_eq!(
            fields,
            vec![
                ("__RequestVerificationToken".to_string(), "abc123".to_string()),
                ("Mode".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_extract_tables_in_document_order() {
        let html = r#"
            <table class="table"><tr><th>Summary</th></tr><tr><td>2 sites</td></tr></table>
            <table class="plain"><tr><td>skip me</td></tr></table>
            <table class="table">
              <thead><tr><th>Credit Site ID</th><th>GHU</th><th>LT</th></tr></thead>
              <tbody>
                <tr><td> BBA-2252 </td><td>1,204.5</td><td>3</td></tr>
                <tr><td>BBA-0001</td><td>0.75</td><td>0</td></tr>
              </tbody>
            </table>"#;
        let tables = extract_tables(html, "table.table").unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].headers, vec!["Summary"]);
        assert_eq!(tables[1].headers, vec!["Credit Site ID", "GHU", "LT"]);
        assert_eq!(tables[1].rows.len(), 2);
        assert_eq!(tables[1].rows[0], vec!["BBA-2252", "1,204.5", "3"]);
    }

    #[test]
    fn test_bad_selector_is_parse_error() {
        assert!(matches!(
            extract_tables("<table></table>", "table[["),
            Err(Error::Parse(_))
        ));
    }
}
