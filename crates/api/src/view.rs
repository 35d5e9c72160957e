use futdesk_core::{OrderKind, OrderRecord};
use futdesk_engine::OperatorSession;
use rust_decimal::Decimal;
use std::fmt::Write;

pub const CONNECT_HINT: &str = "Enter Binance Testnet API keys to begin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    fn css_class(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

/// A message shown above the order form for a single response.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Preformatted block rendered under the message (raw exchange JSON).
    pub detail: Option<String>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            detail: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Everything needed to draw the panel once.
pub struct PanelPage<'a> {
    pub session: &'a OperatorSession,
    pub symbol: Option<&'a str>,
    pub kind: OrderKind,
    pub price: Option<Decimal>,
    pub notices: &'a [Notice],
}

impl PanelPage<'_> {
    pub fn render(&self) -> String {
        let mut html = String::with_capacity(8 * 1024);
        html.push_str(HEAD);
        html.push_str("<body>\n<h1>Binance Futures Testnet Order Desk</h1>\n");

        self.render_sidebar(&mut html);
        html.push_str("<main>\n");
        self.render_notices(&mut html);

        match self.session.connection() {
            Some(connection) => {
                let instruments = &connection.context().instruments;
                self.render_selector(&mut html, instruments);
                self.render_price(&mut html);
                self.render_order_form(&mut html);
                let _ = write!(
                    html,
                    "<section class=\"account\"><h3>Account</h3>\
                     <div class=\"metric\"><span>{} Balance</span><strong>{}</strong></div></section>\n",
                    escape(&self.session.config().balance_asset),
                    escape(&connection.context().balance.to_string()),
                );
            }
            None => {
                if !self.notices.iter().any(|n| n.message == CONNECT_HINT) {
                    render_notice(&mut html, &Notice::info(CONNECT_HINT));
                }
            }
        }

        render_history(&mut html, self.session.history().most_recent_first());
        html.push_str("</main>\n</body>\n</html>\n");
        html
    }

    fn render_sidebar(&self, html: &mut String) {
        html.push_str("<aside>\n<h2>Binance Testnet API</h2>\n");
        if self.session.is_connected() {
            html.push_str(
                "<p class=\"success\">Connected to Binance Testnet</p>\n\
                 <form method=\"post\" action=\"/disconnect\">\
                 <button type=\"submit\">Disconnect</button></form>\n",
            );
        } else {
            html.push_str(
                "<form method=\"post\" action=\"/connect\">\n\
                 <label>API Key <input type=\"text\" name=\"api_key\" autocomplete=\"off\"></label>\n\
                 <label>API Secret <input type=\"password\" name=\"api_secret\" autocomplete=\"off\"></label>\n\
                 <button type=\"submit\">Connect</button>\n</form>\n",
            );
        }
        html.push_str("</aside>\n");
    }

    fn render_notices(&self, html: &mut String) {
        for notice in self.notices {
            render_notice(html, notice);
        }
    }

    fn render_selector(&self, html: &mut String, instruments: &[String]) {
        html.push_str("<form method=\"get\" action=\"/\" class=\"selector\">\n");
        html.push_str("<label>Trading Symbol <select name=\"symbol\" onchange=\"this.form.submit()\">\n");
        for symbol in instruments {
            let selected = if Some(symbol.as_str()) == self.symbol { " selected" } else { "" };
            let _ = writeln!(
                html,
                "<option value=\"{0}\"{1}>{0}</option>",
                escape(symbol),
                selected
            );
        }
        html.push_str("</select></label>\n");
        html.push_str("<label>Order Type <select name=\"kind\" onchange=\"this.form.submit()\">\n");
        for kind in OrderKind::ALL {
            let selected = if kind == self.kind { " selected" } else { "" };
            let _ = writeln!(html, "<option value=\"{0}\"{1}>{0}</option>", kind, selected);
        }
        html.push_str("</select></label>\n</form>\n");
    }

    fn render_price(&self, html: &mut String) {
        match self.price {
            Some(price) => {
                let _ = writeln!(html, "<h3 class=\"price\">Live Price: $ {:.6}</h3>", price);
            }
            None => html.push_str("<h3 class=\"price\">Live Price: unavailable</h3>\n"),
        }
    }

    fn render_order_form(&self, html: &mut String) {
        let symbol = self.symbol.unwrap_or_default();
        html.push_str("<form method=\"post\" action=\"/orders\" class=\"order\">\n");
        let _ = writeln!(
            html,
            "<input type=\"hidden\" name=\"symbol\" value=\"{}\">\n\
             <input type=\"hidden\" name=\"kind\" value=\"{}\">",
            escape(symbol),
            self.kind
        );
        html.push_str(
            "<fieldset><legend>Trade Side</legend>\
             <label><input type=\"radio\" name=\"side\" value=\"BUY\" checked> BUY</label>\
             <label><input type=\"radio\" name=\"side\" value=\"SELL\"> SELL</label></fieldset>\n\
             <label>Quantity <input type=\"number\" name=\"quantity\" min=\"0.0001\" step=\"0.000001\" value=\"0.01\"></label>\n",
        );
        if self.kind.requires_price() {
            html.push_str(
                "<label>Limit Price <input type=\"number\" name=\"price\" min=\"0\" step=\"0.000001\"></label>\n",
            );
        }
        if self.kind.requires_stop_price() {
            html.push_str(
                "<label>Stop Trigger Price <input type=\"number\" name=\"stop_price\" min=\"0\" step=\"0.000001\"></label>\n",
            );
        }
        html.push_str("<button type=\"submit\">Execute Order</button>\n</form>\n");
    }
}

fn render_notice(html: &mut String, notice: &Notice) {
    let _ = write!(
        html,
        "<div class=\"notice {}\">{}",
        notice.level.css_class(),
        escape(&notice.message)
    );
    if let Some(detail) = &notice.detail {
        let _ = write!(html, "<pre>{}</pre>", escape(detail));
    }
    html.push_str("</div>\n");
}

fn render_history<'a>(html: &mut String, records: impl ExactSizeIterator<Item = &'a OrderRecord>) {
    if records.len() == 0 {
        return;
    }
    html.push_str(
        "<section class=\"history\"><h3>Recent Orders</h3>\n<table>\n\
         <tr><th>Time</th><th>Order ID</th><th>Symbol</th><th>Side</th><th>Type</th><th>Status</th><th>Qty</th></tr>\n",
    );
    for record in records {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            record.timestamp.format("%H:%M:%S"),
            record.order_id,
            escape(&record.symbol),
            escape(&record.side),
            escape(&record.kind),
            escape(&record.status),
            escape(&record.quantity),
        );
    }
    html.push_str("</table></section>\n");
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Futures Testnet Order Desk</title>
<style>
body { font-family: system-ui, sans-serif; margin: 0; display: flex; flex-wrap: wrap; }
h1 { width: 100%; margin: 0; padding: 1rem 1.5rem; background: #1e2329; color: #f0b90b; font-size: 1.4rem; }
aside { width: 16rem; padding: 1rem 1.5rem; background: #f5f5f5; }
aside label, form.order label { display: block; margin: 0.5rem 0; }
main { flex: 1; padding: 1rem 1.5rem; max-width: 48rem; }
.notice { padding: 0.6rem 0.8rem; margin: 0.4rem 0; border-radius: 4px; }
.notice.info { background: #e7f1fb; }
.notice.success, p.success { background: #e6f6ec; }
.notice.warning { background: #fff6db; }
.notice.error { background: #fde8e8; }
.notice pre { overflow-x: auto; font-size: 0.8rem; }
.metric strong { display: block; font-size: 1.6rem; }
table { border-collapse: collapse; width: 100%; }
th, td { text-align: left; padding: 0.3rem 0.5rem; border-bottom: 1px solid #ddd; }
</style>
</head>
"#;
