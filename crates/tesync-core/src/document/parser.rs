//! Parser for the HCL subset tesync writes.
//!
//! Accepted top-level blocks are `provider "thousandeyes" { ... }` and
//! `resource "<type>" "<name>" { ... }`. Resource bodies may hold scalar,
//! reference and list attributes plus unlabelled nested blocks, which may
//! nest further. Anything else is a [`SyncError::Parse`]; there is no
//! partial result.

use tracing::debug;

use super::{
    AttrValue, Attributes, ConfigDocument, ManagedProvider, ManagedResource, ResourceKey,
    PROVIDER_NAME, TOKEN_VARIABLE,
};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pos {
    line: usize,
    column: usize,
}

/// A quoted string exactly as written between the quotes (`raw`) and
/// with escapes decoded (`cooked`).
#[derive(Debug, Clone, PartialEq)]
struct Literal {
    cooked: String,
    raw: String,
    templated: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(Literal),
    Number(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Equals,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier `{s}`"),
            Token::Str(lit) => format!("string \"{}\"", lit.raw),
            Token::Number(n) => format!("number {n}"),
            Token::LBrace => "`{`".to_string(),
            Token::RBrace => "`}`".to_string(),
            Token::LBracket => "`[`".to_string(),
            Token::RBracket => "`]`".to_string(),
            Token::Equals => "`=`".to_string(),
            Token::Comma => "`,`".to_string(),
        }
    }
}

fn error_at(pos: Pos, message: impl Into<String>) -> SyncError {
    SyncError::Parse {
        line: pos.line,
        column: pos.column,
        message: message.into(),
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    pos: Pos,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            pos: Pos { line: 1, column: 1 },
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.skip_line(),
                Some('/') if self.peek_second() == Some('/') => self.skip_line(),
                Some('/') if self.peek_second() == Some('*') => {
                    let start = self.pos;
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(error_at(start, "unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, Pos)>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.pos;
            let Some(c) = self.peek() else {
                return Ok(tokens);
            };
            let token = match c {
                '{' => self.single(Token::LBrace),
                '}' => self.single(Token::RBrace),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                '=' => self.single(Token::Equals),
                ',' => self.single(Token::Comma),
                '"' => Token::Str(self.string(start)?),
                '<' => return Err(error_at(start, "heredoc strings are not supported")),
                c if c.is_ascii_digit() || c == '-' => Token::Number(self.number(start)?),
                c if c.is_alphabetic() || c == '_' => Token::Ident(self.ident()),
                other => return Err(error_at(start, format!("unexpected character `{other}`"))),
            };
            tokens.push((token, start));
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn number(&mut self, start: Pos) -> Result<String> {
        let mut out = String::new();
        if self.peek() == Some('-') {
            out.push('-');
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+') {
                out.push(c);
                self.bump();
            } else if c == '-' && out.ends_with(['e', 'E']) {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if !out.chars().any(|c| c.is_ascii_digit()) {
            return Err(error_at(start, format!("malformed number `{out}`")));
        }
        Ok(out)
    }

    fn string(&mut self, start: Pos) -> Result<Literal> {
        self.bump();
        let mut cooked = String::new();
        let mut raw = String::new();
        let mut templated = false;
        loop {
            let c = match self.bump() {
                None | Some('\n') => return Err(error_at(start, "unterminated string")),
                Some('"') => {
                    return Ok(Literal {
                        cooked,
                        raw,
                        templated,
                    })
                }
                Some('\\') => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| error_at(start, "unterminated string"))?;
                    let decoded = match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '"' => '"',
                        '\\' => '\\',
                        other => {
                            return Err(error_at(
                                self.pos,
                                format!("unsupported escape sequence `\\{other}`"),
                            ))
                        }
                    };
                    raw.push('\\');
                    raw.push(escaped);
                    cooked.push(decoded);
                    continue;
                }
                Some(marker @ ('$' | '%'))
                    if self.peek() == Some(marker) && self.peek_second() == Some('{') =>
                {
                    // `$${` and `%%{` are escaped template openers.
                    self.bump();
                    raw.push(marker);
                    raw.push(marker);
                    cooked.push(marker);
                    continue;
                }
                Some(marker @ ('$' | '%')) if self.peek() == Some('{') => {
                    templated = true;
                    marker
                }
                Some(c) => c,
            };
            raw.push(c);
            cooked.push(c);
        }
    }
}

struct Parser {
    tokens: Vec<(Token, Pos)>,
    cursor: usize,
    eof: Pos,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(t, _)| t)
    }

    fn pos(&self) -> Pos {
        self.tokens
            .get(self.cursor)
            .map(|(_, p)| *p)
            .unwrap_or(self.eof)
    }

    fn next(&mut self) -> Result<(Token, Pos)> {
        let item = self
            .tokens
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| error_at(self.eof, "unexpected end of file"))?;
        self.cursor += 1;
        Ok(item)
    }

    fn expect(&mut self, wanted: Token) -> Result<()> {
        let (token, pos) = self.next()?;
        if token == wanted {
            Ok(())
        } else {
            Err(error_at(
                pos,
                format!("expected {}, found {}", wanted.describe(), token.describe()),
            ))
        }
    }

    fn ident(&mut self) -> Result<(String, Pos)> {
        match self.next()? {
            (Token::Ident(name), pos) => Ok((name, pos)),
            (other, pos) => Err(error_at(
                pos,
                format!("expected identifier, found {}", other.describe()),
            )),
        }
    }

    fn labels(&mut self) -> Vec<String> {
        let mut labels = Vec::new();
        while let Some(Token::Str(label)) = self.peek() {
            labels.push(label.cooked.clone());
            self.cursor += 1;
        }
        labels
    }

    fn document(&mut self) -> Result<ConfigDocument> {
        let mut doc = ConfigDocument::new();
        while self.peek().is_some() {
            let (kind, pos) = self.ident()?;
            let labels = self.labels();
            match kind.as_str() {
                "provider" => {
                    let provider = self.provider(&labels, pos)?;
                    if doc.providers.contains_key(&provider.alias) {
                        return Err(error_at(
                            pos,
                            format!("duplicate provider alias `{}`", provider.alias),
                        ));
                    }
                    doc.providers.insert(provider.alias.clone(), provider);
                }
                "resource" => {
                    let resource = self.resource(&labels, pos)?;
                    if doc.resources.contains_key(&resource.key) {
                        return Err(error_at(pos, format!("duplicate resource `{}`", resource.key)));
                    }
                    doc.resources.insert(resource.key.clone(), resource);
                }
                other => {
                    return Err(error_at(pos, format!("unsupported block type `{other}`")));
                }
            }
        }
        Ok(doc)
    }

    fn provider(&mut self, labels: &[String], pos: Pos) -> Result<ManagedProvider> {
        if labels != [PROVIDER_NAME] {
            return Err(error_at(
                pos,
                format!("expected provider \"{PROVIDER_NAME}\", found labels {labels:?}"),
            ));
        }
        let mut body = self.body(false)?;

        let alias = body
            .shift_remove("alias")
            .and_then(|v| v.scalar_text())
            .ok_or_else(|| error_at(pos, "provider block has no `alias`"))?;
        let account_group_id = body
            .shift_remove("account_group_id")
            .and_then(|v| v.scalar_text())
            .ok_or_else(|| {
                error_at(pos, format!("provider `{alias}` has no `account_group_id`"))
            })?;
        let token = body
            .shift_remove("token")
            .unwrap_or_else(|| AttrValue::reference(format!("var.{TOKEN_VARIABLE}")));

        Ok(ManagedProvider {
            alias,
            account_group_id,
            token,
            extra: body,
        })
    }

    fn resource(&mut self, labels: &[String], pos: Pos) -> Result<ManagedResource> {
        let [resource_type, name] = labels else {
            return Err(error_at(
                pos,
                format!("resource block needs a type and a name, found {labels:?}"),
            ));
        };
        let attributes = self.body(true)?;
        Ok(ManagedResource {
            key: ResourceKey::new(resource_type.clone(), name.clone()),
            attributes,
        })
    }

    /// `{ (attr = expr | block { ... })* }`
    fn body(&mut self, allow_blocks: bool) -> Result<Attributes> {
        self.expect(Token::LBrace)?;
        let mut attributes = Attributes::new();
        loop {
            if self.peek() == Some(&Token::RBrace) {
                self.cursor += 1;
                return Ok(attributes);
            }
            let (name, pos) = self.ident()?;
            match self.peek() {
                Some(Token::Equals) => {
                    self.cursor += 1;
                    let value = self.expr()?;
                    if attributes.contains_key(&name) {
                        return Err(error_at(pos, format!("duplicate attribute `{name}`")));
                    }
                    if let Some(value) = value {
                        attributes.insert(name, value);
                    }
                }
                Some(Token::LBrace) if allow_blocks => {
                    let block = self.body(true)?;
                    match attributes
                        .entry(name.clone())
                        .or_insert_with(|| AttrValue::Blocks(Vec::new()))
                    {
                        AttrValue::Blocks(blocks) => blocks.push(block),
                        _ => {
                            return Err(error_at(
                                pos,
                                format!("`{name}` is used both as attribute and block"),
                            ))
                        }
                    }
                }
                Some(Token::Str(_)) | Some(Token::LBrace) => {
                    return Err(error_at(pos, format!("unsupported nested block `{name}`")));
                }
                _ => {
                    let found = self
                        .peek()
                        .map(Token::describe)
                        .unwrap_or_else(|| "end of file".to_string());
                    return Err(error_at(
                        self.pos(),
                        format!("expected `=` after `{name}`, found {found}"),
                    ));
                }
            }
        }
    }

    /// Returns `None` for `null`, which Terraform treats as unset.
    fn expr(&mut self) -> Result<Option<AttrValue>> {
        let (token, pos) = self.next()?;
        let value = match token {
            Token::Str(lit) => string_value(lit),
            Token::Number(raw) => AttrValue::Number(parse_number(&raw, pos)?),
            Token::Ident(word) => match word.as_str() {
                "true" => AttrValue::Bool(true),
                "false" => AttrValue::Bool(false),
                "null" => return Ok(None),
                _ => AttrValue::Reference(word),
            },
            Token::LBracket => self.list(pos)?,
            other => {
                return Err(error_at(
                    pos,
                    format!("expected a value, found {}", other.describe()),
                ))
            }
        };
        Ok(Some(value))
    }

    /// List of scalars, or list of object literals (read as nested blocks).
    fn list(&mut self, open: Pos) -> Result<AttrValue> {
        let mut items = Vec::new();
        let mut objects = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBracket) => {
                    self.cursor += 1;
                    break;
                }
                Some(Token::LBrace) => objects.push(self.object()?),
                Some(_) => {
                    let pos = self.pos();
                    match self.expr()? {
                        Some(AttrValue::List(_)) => {
                            return Err(error_at(pos, "nested lists are not supported"))
                        }
                        Some(value) => items.push(value),
                        None => return Err(error_at(pos, "null list elements are not supported")),
                    }
                }
                None => return Err(error_at(open, "unterminated list")),
            }
            if self.peek() == Some(&Token::Comma) {
                self.cursor += 1;
            }
        }
        match (items.is_empty(), objects.is_empty()) {
            (_, true) => Ok(AttrValue::List(items)),
            (true, false) => Ok(AttrValue::Blocks(objects)),
            (false, false) => Err(error_at(open, "list mixes objects and scalars")),
        }
    }

    /// `{ key = value [,] ... }`
    fn object(&mut self) -> Result<Attributes> {
        self.expect(Token::LBrace)?;
        let mut fields = Attributes::new();
        loop {
            if self.peek() == Some(&Token::RBrace) {
                self.cursor += 1;
                return Ok(fields);
            }
            let (name, _) = self.ident()?;
            self.expect(Token::Equals)?;
            if let Some(value) = self.expr()? {
                fields.insert(name, value);
            }
            if self.peek() == Some(&Token::Comma) {
                self.cursor += 1;
            }
        }
    }
}

/// `"${expr}"` is the legacy spelling of a bare expression; other strings
/// with interpolation are kept verbatim as templates.
fn string_value(lit: Literal) -> AttrValue {
    if !lit.templated {
        return AttrValue::String(lit.cooked);
    }
    let interpolation_only = lit
        .raw
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|inner| !inner.contains(['{', '}', '"']));
    match interpolation_only {
        Some(inner) => AttrValue::Reference(inner.trim().to_string()),
        None => AttrValue::Template(lit.raw),
    }
}

fn parse_number(raw: &str, pos: Pos) -> Result<serde_json::Number> {
    if let Ok(n) = raw.parse::<i64>() {
        return Ok(n.into());
    }
    if let Ok(n) = raw.parse::<u64>() {
        return Ok(n.into());
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .ok_or_else(|| error_at(pos, format!("malformed number `{raw}`")))
}

/// Parse the text of a managed Terraform file.
pub fn parse_document(text: &str) -> Result<ConfigDocument> {
    let lexer = Lexer::new(text);
    let eof = {
        let mut probe = Lexer::new(text);
        while probe.bump().is_some() {}
        probe.pos
    };
    let tokens = lexer.tokenize()?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        eof,
    };
    let doc = parser.document()?;
    debug!(
        providers = doc.providers.len(),
        resources = doc.resources.len(),
        "parsed terraform document"
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# managed by tesync
provider "thousandeyes" {
  alias = "prod"
  token = var.token
  account_group_id = "555"
}

resource "thousandeyes_http_server" "checkout" {
  test_name = "Checkout"
  interval  = 60
  enabled   = true
  url       = "https://shop.example.com/$${path}"
  provider  = thousandeyes.prod
  agents {
    agent_id = 9
  }
  agents {
    agent_id = 10
  }
}
"#;

    #[test]
    fn parses_provider_and_resource() {
        let doc = parse_document(SAMPLE).unwrap();

        let provider = doc.provider("prod").unwrap();
        assert_eq!(provider.account_group_id, "555");
        assert_eq!(provider.token, AttrValue::reference("var.token"));

        let key = ResourceKey::new("thousandeyes_http_server", "checkout");
        let resource = doc.resource(&key).unwrap();
        assert_eq!(resource.provider_alias(), Some("prod"));
        assert_eq!(resource.attributes["interval"], AttrValue::Number(60.into()));
        assert_eq!(resource.attributes["enabled"], AttrValue::Bool(true));
        assert_eq!(
            resource.attributes["url"],
            AttrValue::string("https://shop.example.com/${path}")
        );
        match &resource.attributes["agents"] {
            AttrValue::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                assert_eq!(blocks[1]["agent_id"], AttrValue::Number(10.into()));
            }
            other => panic!("expected blocks, got {other:?}"),
        }
    }

    #[test]
    fn interpolations_survive_as_references_and_templates() {
        let doc = parse_document(
            r#"provider "thousandeyes" {
  alias = "legacy"
  token = "${var.thousandeyes_token}"
  account_group_id = 77
}

resource "thousandeyes_api" "probe" {
  url = "https://${var.host}/health"
  provider = "${thousandeyes.legacy}"
}
"#,
        )
        .unwrap();
        let provider = doc.provider("legacy").unwrap();
        assert_eq!(provider.token, AttrValue::reference("var.thousandeyes_token"));
        assert_eq!(provider.account_group_id, "77");

        let resource = doc.resources.values().next().unwrap();
        assert_eq!(resource.provider_alias(), Some("legacy"));
        assert_eq!(
            resource.attributes["url"],
            AttrValue::Template("https://${var.host}/health".to_string())
        );
    }

    #[test]
    fn empty_text_is_an_empty_document() {
        assert!(parse_document("").unwrap().is_empty());
        assert!(parse_document("  // nothing\n/* here */\n").unwrap().is_empty());
    }

    #[test]
    fn null_attributes_are_dropped_and_lists_parse() {
        let doc = parse_document(
            r#"resource "thousandeyes_dns_server" "dns" {
  alert_rules = null
  dns_servers = ["ns1.example.com", "ns2.example.com",]
  agents = [{ agent_id = 1 }, { agent_id = 2 }]
  ratio = 0.5
  offset = -3
}"#,
        )
        .unwrap();
        let resource = doc.resources.values().next().unwrap();
        assert!(!resource.attributes.contains_key("alert_rules"));
        assert_eq!(
            resource.attributes["dns_servers"],
            AttrValue::List(vec![
                AttrValue::string("ns1.example.com"),
                AttrValue::string("ns2.example.com")
            ])
        );
        assert!(matches!(&resource.attributes["agents"], AttrValue::Blocks(b) if b.len() == 2));
        assert_eq!(resource.attributes["offset"], AttrValue::Number((-3).into()));
    }

    #[test]
    fn nested_blocks_nest_past_one_level() {
        let doc = parse_document(
            r#"resource "thousandeyes_http_server" "h" {
  custom_headers {
    request {
      x_trace = "on"
    }
  }
}"#,
        )
        .unwrap();
        let resource = doc.resources.values().next().unwrap();
        let AttrValue::Blocks(outer) = &resource.attributes["custom_headers"] else {
            panic!("expected blocks");
        };
        let AttrValue::Blocks(inner) = &outer[0]["request"] else {
            panic!("expected nested blocks");
        };
        assert_eq!(inner[0]["x_trace"], AttrValue::string("on"));
    }

    #[test]
    fn dollar_before_escaped_opener_is_literal() {
        let doc = parse_document(
            "resource \"a\" \"b\" {\n  x = \"$$${y}\"\n  z = \"$$ and $$$\"\n}",
        )
        .unwrap();
        let resource = doc.resources.values().next().unwrap();
        assert_eq!(resource.attributes["x"], AttrValue::string("$${y}"));
        assert_eq!(resource.attributes["z"], AttrValue::string("$$ and $$$"));
    }

    #[test]
    fn unknown_top_level_block_is_rejected() {
        let err = parse_document("variable \"token\" {\n  type = string\n}\n").unwrap_err();
        match err {
            SyncError::Parse { line, message, .. } => {
                assert_eq!(line, 1);
                assert!(message.contains("unsupported block type `variable`"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn provider_without_alias_is_rejected() {
        let err = parse_document("provider \"thousandeyes\" {\n  account_group_id = \"1\"\n}")
            .unwrap_err();
        assert!(err.to_string().contains("no `alias`"));
    }

    #[test]
    fn duplicate_resource_is_rejected() {
        let text = "resource \"a\" \"b\" {}\nresource \"a\" \"b\" {}\n";
        assert!(parse_document(text)
            .unwrap_err()
            .to_string()
            .contains("duplicate resource `a.b`"));
    }

    #[test]
    fn unterminated_body_reports_eof() {
        let err = parse_document("resource \"a\" \"b\" {\n  x = 1\n").unwrap_err();
        assert!(err.to_string().contains("unexpected end of file"));
    }

    #[test]
    fn heredoc_is_rejected_with_position() {
        let err = parse_document("resource \"a\" \"b\" {\n  x = <<EOT\nhi\nEOT\n}").unwrap_err();
        match err {
            SyncError::Parse { line, column, .. } => assert_eq!((line, column), (2, 7)),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
