//! Chat-Template Engine (§4.G).
//!
//! Renders a model family's chat prompt format from a message list using a
//! minimal, well-defined template grammar (Design Note: replaces full
//! Jinja2 execution): `{{ expr }}`, `{% if %}/{% elif %}/{% else %}/{%
//! endif %}`, `{% for x in seq %}/{% endfor %}`, property/array access,
//! slicing `seq[a:b]`, `==` comparison, and string/integer literals.
//! Anything outside this grammar is rejected at template *registration*
//! time, not at render time.

use gateway_core::request::{ChatMessage, MessageContent, MessageRole};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Errors raised by template registration or rendering.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TemplateError {
    /// The template source uses a construct outside the supported grammar.
    #[error("unsupported template construct: {0}")]
    UnsupportedConstruct(String),
    /// An `{% if/for %}` block was opened but never closed, or closed
    /// without a matching opener.
    #[error("unbalanced block: {0}")]
    UnbalancedBlock(String),
    /// A variable referenced at render time was not bound in the context.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    /// An index/slice was applied to a non-indexable value, or the index
    /// was out of range.
    #[error("invalid index: {0}")]
    InvalidIndex(String),
}

/// The chat-format family a model belongs to, auto-detected from its id or
/// an accompanying tokenizer config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatTemplateFamily {
    /// Meta Llama 2/3 instruction format.
    Llama,
    /// Mistral/Mixtral instruction format.
    Mistral,
    /// Alibaba Qwen chat format.
    Qwen,
    /// Microsoft Phi chat format.
    Phi,
    /// Google Gemma chat format.
    Gemma,
    /// Hugging Face SmolLM3 chat format.
    SmolLM3,
    /// Anthropic Claude's Human/Assistant format.
    Claude,
    /// Unrecognized family; uses the default template.
    Default,
}

impl fmt::Display for ChatTemplateFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Llama => "llama",
            Self::Mistral => "mistral",
            Self::Qwen => "qwen",
            Self::Phi => "phi",
            Self::Gemma => "gemma",
            Self::SmolLM3 => "smollm3",
            Self::Claude => "claude",
            Self::Default => "default",
        };
        write!(f, "{s}")
    }
}

impl ChatTemplateFamily {
    /// Detect the family from a model id/path (case-insensitive substring
    /// match), falling back to [`ChatTemplateFamily::Default`].
    #[must_use]
    pub fn detect(model_id: &str) -> Self {
        let lower = model_id.to_lowercase();
        if lower.contains("llama") {
            Self::Llama
        } else if lower.contains("mistral") || lower.contains("mixtral") {
            Self::Mistral
        } else if lower.contains("qwen") {
            Self::Qwen
        } else if lower.contains("phi") {
            Self::Phi
        } else if lower.contains("gemma") {
            Self::Gemma
        } else if lower.contains("smollm3") || lower.contains("smol-lm3") {
            Self::SmolLM3
        } else if lower.contains("claude") {
            Self::Claude
        } else {
            Self::Default
        }
    }

    /// The family-specific default system instruction, injected only when
    /// no explicit system message is present.
    #[must_use]
    pub fn default_system_prompt(self) -> &'static str {
        match self {
            Self::Llama => "You are a helpful, respectful and honest assistant.",
            Self::Mistral => "You are a helpful assistant.",
            Self::Qwen => "You are Qwen, created by Alibaba Cloud. You are a helpful assistant.",
            Self::Phi => "You are a helpful AI assistant.",
            Self::Gemma => "You are a helpful assistant.",
            Self::SmolLM3 => "You are a helpful assistant.",
            Self::Claude => "You are Claude, an AI assistant made by Anthropic.",
            Self::Default => "You are a helpful assistant.",
        }
    }
}

/// A compiled chat template: the parsed grammar plus the stop tokens and
/// system-prompt support the family declares.
#[derive(Debug, Clone)]
pub struct ChatTemplate {
    family: ChatTemplateFamily,
    nodes: Vec<Node>,
    /// Sequences that terminate generation for this family.
    pub stop_tokens: Vec<String>,
    /// Whether a `system` role message may be injected.
    pub system_support: bool,
}

/// The rendered result of applying a template to a message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// The final prompt string to send to the model.
    pub prompt: String,
    /// Stop sequences the caller should pass alongside the prompt.
    pub stop_tokens: Vec<String>,
    /// Whether the template honored a system message.
    pub system_support: bool,
}

impl ChatTemplate {
    /// Parse and validate `source` as a template for `family`. Returns
    /// [`TemplateError::UnsupportedConstruct`] or
    /// [`TemplateError::UnbalancedBlock`] if `source` is outside the
    /// supported grammar -- this is the "registration time" rejection the
    /// design calls for.
    pub fn compile(
        family: ChatTemplateFamily,
        source: &str,
        stop_tokens: Vec<String>,
        system_support: bool,
    ) -> Result<Self, TemplateError> {
        let nodes = parse(source)?;
        Ok(Self {
            family,
            nodes,
            stop_tokens,
            system_support,
        })
    }

    /// Which family this template renders.
    #[must_use]
    pub fn family(&self) -> ChatTemplateFamily {
        self.family
    }

    /// Render this template against `messages`, injecting the family's
    /// default system instruction iff `system_support` is set and no
    /// explicit system message is present.
    pub fn render(&self, messages: &[ChatMessage]) -> Result<RenderedPrompt, TemplateError> {
        let mut effective = messages.to_vec();
        if self.system_support && !effective.iter().any(|m| matches!(m.role, MessageRole::System)) {
            effective.insert(0, ChatMessage::system(self.family.default_system_prompt()));
        }

        let messages_value = Value::Array(effective.iter().map(message_to_value).collect());
        let mut ctx: HashMap<String, Value> = HashMap::new();
        ctx.insert("messages".to_string(), messages_value);
        ctx.insert(
            "system_support".to_string(),
            Value::Bool(self.system_support),
        );

        let mut out = String::new();
        render_nodes(&self.nodes, &ctx, &mut out)?;
        Ok(RenderedPrompt {
            prompt: out,
            stop_tokens: self.stop_tokens.clone(),
            system_support: self.system_support,
        })
    }
}

fn message_to_value(message: &ChatMessage) -> Value {
    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };
    let content = match &message.content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                gateway_core::request::ContentPart::Text { text } => Some(text.clone()),
                gateway_core::request::ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
    };
    serde_json::json!({ "role": role, "content": content })
}

/// Registry of compiled templates, keyed by family, with a fallback to
/// [`ChatTemplateFamily::Default`] for unrecognized families.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<ChatTemplateFamily, ChatTemplate>,
}

impl TemplateRegistry {
    /// Build a registry pre-populated with the built-in default template
    /// for every enumerated family plus the fallback.
    ///
    /// # Panics
    /// Never -- the built-in sources are known to satisfy the grammar;
    /// this is asserted by the module's own tests.
    #[must_use]
    pub fn with_builtin_defaults() -> Self {
        let mut registry = Self::default();
        for family in [
            ChatTemplateFamily::Llama,
            ChatTemplateFamily::Mistral,
            ChatTemplateFamily::Qwen,
            ChatTemplateFamily::Phi,
            ChatTemplateFamily::Gemma,
            ChatTemplateFamily::SmolLM3,
            ChatTemplateFamily::Claude,
            ChatTemplateFamily::Default,
        ] {
            let template = builtin_template(family).expect("builtin templates satisfy the grammar");
            registry.register(template);
        }
        registry
    }

    /// Register (or replace) the template for its family.
    pub fn register(&mut self, template: ChatTemplate) {
        self.templates.insert(template.family(), template);
    }

    /// Look up the template for `family`, falling back to
    /// [`ChatTemplateFamily::Default`] if unregistered.
    #[must_use]
    pub fn get(&self, family: ChatTemplateFamily) -> Option<&ChatTemplate> {
        self.templates
            .get(&family)
            .or_else(|| self.templates.get(&ChatTemplateFamily::Default))
    }

    /// Detect the family from `model_id` and render `messages` against its
    /// template (or the default template if the family/lookup fails).
    ///
    /// # Errors
    /// Returns [`TemplateError::UndefinedVariable`]/[`TemplateError::InvalidIndex`]
    /// propagated from rendering.
    pub fn render_for_model(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
    ) -> Result<RenderedPrompt, TemplateError> {
        let family = ChatTemplateFamily::detect(model_id);
        let template = self
            .get(family)
            .ok_or_else(|| TemplateError::UndefinedVariable("no default template registered".to_string()))?;
        template.render(messages)
    }
}

fn builtin_template(family: ChatTemplateFamily) -> Result<ChatTemplate, TemplateError> {
    let (source, stop_tokens, system_support): (&str, Vec<&str>, bool) = match family {
        ChatTemplateFamily::Llama => (
            "{% for m in messages %}{% if m.role == \"system\" %}<<SYS>>{{ m.content }}<</SYS>>\n{% elif m.role == \"user\" %}[INST] {{ m.content }} [/INST]\n{% else %}{{ m.content }}\n{% endif %}{% endfor %}",
            vec!["</s>", "[INST]"],
            true,
        ),
        ChatTemplateFamily::Mistral => (
            "{% for m in messages %}{% if m.role == \"user\" %}[INST] {{ m.content }} [/INST]\n{% else %}{{ m.content }}\n{% endif %}{% endfor %}",
            vec!["</s>"],
            false,
        ),
        ChatTemplateFamily::Qwen => (
            "{% for m in messages %}<|im_start|>{{ m.role }}\n{{ m.content }}<|im_end|>\n{% endfor %}<|im_start|>assistant\n",
            vec!["<|im_end|>"],
            true,
        ),
        ChatTemplateFamily::Phi => (
            "{% for m in messages %}<|{{ m.role }}|>\n{{ m.content }}<|end|>\n{% endfor %}<|assistant|>\n",
            vec!["<|end|>"],
            true,
        ),
        ChatTemplateFamily::Gemma => (
            "{% for m in messages %}<start_of_turn>{{ m.role }}\n{{ m.content }}<end_of_turn>\n{% endfor %}<start_of_turn>model\n",
            vec!["<end_of_turn>"],
            false,
        ),
        ChatTemplateFamily::SmolLM3 => (
            "{% for m in messages %}<|im_start|>{{ m.role }}\n{{ m.content }}<|im_end|>\n{% endfor %}<|im_start|>assistant\n",
            vec!["<|im_end|>"],
            true,
        ),
        ChatTemplateFamily::Claude => (
            "{% for m in messages %}{% if m.role == \"user\" %}\n\nHuman: {{ m.content }}{% else %}\n\nAssistant: {{ m.content }}{% endif %}{% endfor %}\n\nAssistant:",
            vec!["\n\nHuman:"],
            true,
        ),
        ChatTemplateFamily::Default => (
            "{% for m in messages %}{{ m.role }}: {{ m.content }}\n{% endfor %}assistant:",
            vec![],
            true,
        ),
    };
    ChatTemplate::compile(
        family,
        source,
        stop_tokens.into_iter().map(str::to_string).collect(),
        system_support,
    )
}

// --- Grammar: parsing -------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Expr(Expr),
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        else_body: Option<Vec<Node>>,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Node>,
    },
}

#[derive(Debug, Clone)]
enum Expr {
    Str(String),
    Int(i64),
    Bool(bool),
    Path(Vec<PathSegment>),
    Eq(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
enum PathSegment {
    Ident(String),
    Property(String),
    Index(Box<Expr>),
    Slice(Option<Box<Expr>>, Option<Box<Expr>>),
}

#[derive(Debug, Clone)]
enum Tag {
    Expr(String),
    If(String),
    Elif(String),
    Else,
    Endif,
    For(String),
    Endfor,
}

/// One `{{ expr }}` or `{% tag %}` span plus the literal text preceding it.
struct Segment {
    text_before: String,
    tag: Option<Tag>,
}

/// Split `source` into alternating literal text and tag spans.
fn segment(source: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = source;
    loop {
        match rest.find("{{").or_else(|| rest.find("{%")) {
            None => {
                segments.push(Segment {
                    text_before: rest.to_string(),
                    tag: None,
                });
                break;
            }
            Some(start) => {
                let is_expr = rest[start..].starts_with("{{");
                let (open, close) = if is_expr { ("{{", "}}") } else { ("{%", "%}") };
                let text_before = rest[..start].to_string();
                let after_open = &rest[start + open.len()..];
                let Some(end) = after_open.find(close) else {
                    return Err(TemplateError::UnbalancedBlock(format!(
                        "unterminated '{open}' with no matching '{close}'"
                    )));
                };
                let inner = after_open[..end].trim().to_string();
                let tag = if is_expr {
                    Tag::Expr(inner)
                } else {
                    parse_tag_keyword(&inner)?
                };
                segments.push(Segment {
                    text_before,
                    tag: Some(tag),
                });
                rest = &after_open[end + close.len()..];
            }
        }
    }
    Ok(segments)
}

fn parse_tag_keyword(inner: &str) -> Result<Tag, TemplateError> {
    if let Some(rest) = inner.strip_prefix("if ") {
        return Ok(Tag::If(rest.trim().to_string()));
    }
    if let Some(rest) = inner.strip_prefix("elif ") {
        return Ok(Tag::Elif(rest.trim().to_string()));
    }
    if inner.trim() == "else" {
        return Ok(Tag::Else);
    }
    if inner.trim() == "endif" {
        return Ok(Tag::Endif);
    }
    if let Some(rest) = inner.strip_prefix("for ") {
        return Ok(Tag::For(rest.trim().to_string()));
    }
    if inner.trim() == "endfor" {
        return Ok(Tag::Endfor);
    }
    Err(TemplateError::UnsupportedConstruct(format!(
        "unrecognized block tag '{{% {inner} %}}'"
    )))
}

/// Parse `source` into a node tree: split into segments, then fold the
/// flat tag list into nested `If`/`For` blocks via an explicit stack.
fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let segments = segment(source)?;
    let mut stack: Vec<Frame> = vec![Frame::new_root()];

    for seg in &segments {
        if !seg.text_before.is_empty() {
            stack.last_mut().unwrap().push(Node::Text(seg.text_before.clone()));
        }
        match &seg.tag {
            None => {}
            Some(Tag::Expr(src)) => {
                let expr = parse_expr(src)?;
                stack.last_mut().unwrap().push(Node::Expr(expr));
            }
            Some(Tag::If(cond)) => {
                let expr = parse_expr(cond)?;
                stack.push(Frame::If {
                    branches: vec![(expr, Vec::new())],
                    else_body: None,
                    in_else: false,
                });
            }
            Some(Tag::Elif(cond)) => {
                let expr = parse_expr(cond)?;
                match stack.last_mut() {
                    Some(Frame::If {
                        branches, in_else, ..
                    }) if !*in_else => {
                        branches.push((expr, Vec::new()));
                    }
                    _ => {
                        return Err(TemplateError::UnbalancedBlock(
                            "'elif' without a matching 'if'".to_string(),
                        ))
                    }
                }
            }
            Some(Tag::Else) => match stack.last_mut() {
                Some(Frame::If { in_else, .. }) => *in_else = true,
                _ => {
                    return Err(TemplateError::UnbalancedBlock(
                        "'else' without a matching 'if'/'for'".to_string(),
                    ))
                }
            },
            Some(Tag::Endif) => {
                let frame = stack.pop().ok_or_else(|| {
                    TemplateError::UnbalancedBlock("'endif' without a matching 'if'".to_string())
                })?;
                let Frame::If {
                    branches,
                    else_body,
                    ..
                } = frame
                else {
                    return Err(TemplateError::UnbalancedBlock(
                        "'endif' does not close an 'if' block".to_string(),
                    ));
                };
                stack.last_mut().unwrap().push(Node::If { branches, else_body });
            }
            Some(Tag::For(clause)) => {
                let (var, iter_expr) = parse_for_clause(clause)?;
                stack.push(Frame::For {
                    var,
                    iter: iter_expr,
                    body: Vec::new(),
                });
            }
            Some(Tag::Endfor) => {
                let frame = stack.pop().ok_or_else(|| {
                    TemplateError::UnbalancedBlock("'endfor' without a matching 'for'".to_string())
                })?;
                let Frame::For { var, iter, body } = frame else {
                    return Err(TemplateError::UnbalancedBlock(
                        "'endfor' does not close a 'for' block".to_string(),
                    ));
                };
                stack.last_mut().unwrap().push(Node::For { var, iter, body });
            }
        }
    }

    if stack.len() != 1 {
        return Err(TemplateError::UnbalancedBlock(
            "template has an unclosed 'if'/'for' block".to_string(),
        ));
    }
    match stack.pop().unwrap() {
        Frame::Root(nodes) => Ok(nodes),
        _ => unreachable!("root frame is always Frame::Root"),
    }
}

enum Frame {
    Root(Vec<Node>),
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        else_body: Option<Vec<Node>>,
        in_else: bool,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Node>,
    },
}

impl Frame {
    fn new_root() -> Self {
        Self::Root(Vec::new())
    }

    fn push(&mut self, node: Node) {
        match self {
            Self::Root(nodes) => nodes.push(node),
            Self::If {
                branches,
                else_body,
                in_else,
            } => {
                if *in_else {
                    else_body.get_or_insert_with(Vec::new).push(node);
                } else {
                    branches.last_mut().expect("if always has >=1 branch").1.push(node);
                }
            }
            Self::For { body, .. } => body.push(node),
        }
    }
}

fn parse_for_clause(clause: &str) -> Result<(String, Expr), TemplateError> {
    let Some((var, rest)) = clause.split_once(" in ") else {
        return Err(TemplateError::UnsupportedConstruct(format!(
            "'for' clause must be 'x in seq', got 'for {clause}'"
        )));
    };
    let var = var.trim();
    if var.is_empty() || !var.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(TemplateError::UnsupportedConstruct(format!(
            "invalid loop variable name '{var}'"
        )));
    }
    Ok((var.to_string(), parse_expr(rest.trim())?))
}

fn parse_expr(src: &str) -> Result<Expr, TemplateError> {
    let mut parser = ExprParser { src, pos: 0 };
    let expr = parser.parse_equality()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(TemplateError::UnsupportedConstruct(format!(
            "trailing characters in expression '{src}'"
        )));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src.as_bytes()[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn parse_equality(&mut self) -> Result<Expr, TemplateError> {
        let left = self.parse_primary()?;
        self.skip_ws();
        if self.rest().starts_with("==") {
            self.pos += 2;
            self.skip_ws();
            let right = self.parse_primary()?;
            return Ok(Expr::Eq(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, TemplateError> {
        self.skip_ws();
        let rest = self.rest();
        if let Some(stripped) = rest.strip_prefix('"') {
            let Some(end) = stripped.find('"') else {
                return Err(TemplateError::UnsupportedConstruct(
                    "unterminated string literal".to_string(),
                ));
            };
            let value = stripped[..end].to_string();
            self.pos += 1 + end + 1;
            return Ok(Expr::Str(value));
        }
        if rest.starts_with(|c: char| c.is_ascii_digit())
            || (rest.starts_with('-') && rest[1..].starts_with(|c: char| c.is_ascii_digit()))
        {
            let digits_len = rest
                .char_indices()
                .take_while(|(i, c)| *i == 0 && *c == '-' || c.is_ascii_digit())
                .count();
            let token = &rest[..digits_len];
            let value: i64 = token.parse().map_err(|_| {
                TemplateError::UnsupportedConstruct(format!("invalid integer literal '{token}'"))
            })?;
            self.pos += digits_len;
            return Ok(Expr::Int(value));
        }
        if let Some(rest2) = rest.strip_prefix("true") {
            if !rest2.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
                self.pos += 4;
                return Ok(Expr::Bool(true));
            }
        }
        if let Some(rest2) = rest.strip_prefix("false") {
            if !rest2.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
                self.pos += 5;
                return Ok(Expr::Bool(false));
            }
        }
        self.parse_path()
    }

    fn parse_path(&mut self) -> Result<Expr, TemplateError> {
        let ident = self.parse_ident()?;
        let mut segments = vec![PathSegment::Ident(ident)];
        loop {
            if self.rest().starts_with('.') {
                self.pos += 1;
                let prop = self.parse_ident()?;
                segments.push(PathSegment::Property(prop));
            } else if self.rest().starts_with('[') {
                self.pos += 1;
                let segment = self.parse_index_or_slice()?;
                self.skip_ws();
                if !self.rest().starts_with(']') {
                    return Err(TemplateError::UnsupportedConstruct(
                        "expected ']' to close index/slice".to_string(),
                    ));
                }
                self.pos += 1;
                segments.push(segment);
            } else {
                break;
            }
        }
        Ok(Expr::Path(segments))
    }

    fn parse_index_or_slice(&mut self) -> Result<PathSegment, TemplateError> {
        self.skip_ws();
        if self.rest().starts_with(':') {
            self.pos += 1;
            self.skip_ws();
            if self.rest().starts_with(']') {
                return Ok(PathSegment::Slice(None, None));
            }
            let end = self.parse_primary()?;
            return Ok(PathSegment::Slice(None, Some(Box::new(end))));
        }
        let first = self.parse_primary()?;
        self.skip_ws();
        if self.rest().starts_with(':') {
            self.pos += 1;
            self.skip_ws();
            if self.rest().starts_with(']') {
                return Ok(PathSegment::Slice(Some(Box::new(first)), None));
            }
            let end = self.parse_primary()?;
            return Ok(PathSegment::Slice(Some(Box::new(first)), Some(Box::new(end))));
        }
        Ok(PathSegment::Index(Box::new(first)))
    }

    fn parse_ident(&mut self) -> Result<String, TemplateError> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
            .count();
        if len == 0 {
            return Err(TemplateError::UnsupportedConstruct(format!(
                "expected identifier at '{rest}'"
            )));
        }
        let ident = rest[..len].to_string();
        self.pos += len;
        Ok(ident)
    }
}

// --- Grammar: rendering ------------------------------------------------

fn render_nodes(nodes: &[Node], ctx: &HashMap<String, Value>, out: &mut String) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Expr(expr) => {
                let value = eval(expr, ctx)?;
                out.push_str(&value_to_display(&value));
            }
            Node::If { branches, else_body } => {
                let mut rendered = false;
                for (cond, body) in branches {
                    if eval(cond, ctx)?.as_bool().unwrap_or(false) {
                        render_nodes(body, ctx, out)?;
                        rendered = true;
                        break;
                    }
                }
                if !rendered {
                    if let Some(body) = else_body {
                        render_nodes(body, ctx, out)?;
                    }
                }
            }
            Node::For { var, iter, body } => {
                let seq = eval(iter, ctx)?;
                let Value::Array(items) = seq else {
                    return Err(TemplateError::InvalidIndex(format!(
                        "'for {var} in ...' requires an array"
                    )));
                };
                for item in items {
                    let mut scoped = ctx.clone();
                    scoped.insert(var.clone(), item);
                    render_nodes(body, &scoped, out)?;
                }
            }
        }
    }
    Ok(())
}

fn eval(expr: &Expr, ctx: &HashMap<String, Value>) -> Result<Value, TemplateError> {
    match expr {
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Int(i) => Ok(Value::Number((*i).into())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Eq(a, b) => Ok(Value::Bool(eval(a, ctx)? == eval(b, ctx)?)),
        Expr::Path(segments) => eval_path(segments, ctx),
    }
}

fn eval_path(segments: &[PathSegment], ctx: &HashMap<String, Value>) -> Result<Value, TemplateError> {
    let PathSegment::Ident(name) = &segments[0] else {
        unreachable!("path always starts with Ident");
    };
    let mut value = ctx
        .get(name)
        .cloned()
        .ok_or_else(|| TemplateError::UndefinedVariable(name.clone()))?;

    for segment in &segments[1..] {
        value = match segment {
            PathSegment::Ident(_) => unreachable!("only the first segment is an Ident"),
            PathSegment::Property(prop) => value
                .get(prop)
                .cloned()
                .ok_or_else(|| TemplateError::UndefinedVariable(format!("{name}.{prop}")))?,
            PathSegment::Index(idx_expr) => {
                let idx = eval(idx_expr, ctx)?;
                let idx = idx
                    .as_i64()
                    .ok_or_else(|| TemplateError::InvalidIndex("index must be an integer".to_string()))?;
                index_value(&value, idx)?
            }
            PathSegment::Slice(start, end) => {
                let Value::Array(items) = &value else {
                    return Err(TemplateError::InvalidIndex("slice requires an array".to_string()));
                };
                let len = items.len() as i64;
                let start = start
                    .as_ref()
                    .map(|e| eval(e, ctx))
                    .transpose()?
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0)
                    .clamp(0, len);
                let end = end
                    .as_ref()
                    .map(|e| eval(e, ctx))
                    .transpose()?
                    .and_then(|v| v.as_i64())
                    .unwrap_or(len)
                    .clamp(0, len);
                let slice = if start < end {
                    items[start as usize..end as usize].to_vec()
                } else {
                    Vec::new()
                };
                Value::Array(slice)
            }
        };
    }
    Ok(value)
}

fn index_value(value: &Value, idx: i64) -> Result<Value, TemplateError> {
    let Value::Array(items) = value else {
        return Err(TemplateError::InvalidIndex("index requires an array".to_string()));
    };
    let resolved = if idx < 0 { items.len() as i64 + idx } else { idx };
    items
        .get(usize::try_from(resolved).unwrap_or(usize::MAX))
        .cloned()
        .ok_or_else(|| TemplateError::InvalidIndex(format!("index {idx} out of range")))
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::request::ChatMessage;

    #[test]
    fn test_family_detection() {
        assert_eq!(ChatTemplateFamily::detect("meta-llama/Llama-3-8b"), ChatTemplateFamily::Llama);
        assert_eq!(ChatTemplateFamily::detect("mistralai/Mistral-7B"), ChatTemplateFamily::Mistral);
        assert_eq!(ChatTemplateFamily::detect("gpt-4"), ChatTemplateFamily::Default);
    }

    #[test]
    fn test_builtin_templates_all_compile() {
        let registry = TemplateRegistry::with_builtin_defaults();
        for family in [
            ChatTemplateFamily::Llama,
            ChatTemplateFamily::Mistral,
            ChatTemplateFamily::Qwen,
            ChatTemplateFamily::Phi,
            ChatTemplateFamily::Gemma,
            ChatTemplateFamily::SmolLM3,
            ChatTemplateFamily::Claude,
            ChatTemplateFamily::Default,
        ] {
            assert!(registry.get(family).is_some());
        }
    }

    #[test]
    fn test_render_llama_includes_system_and_user() {
        let registry = TemplateRegistry::with_builtin_defaults();
        let messages = vec![ChatMessage::user("hello there")];
        let rendered = registry.render_for_model("meta-llama/Llama-3-8b", &messages).expect("renders");
        assert!(rendered.prompt.contains("<<SYS>>"));
        assert!(rendered.prompt.contains("[INST] hello there [/INST]"));
    }

    #[test]
    fn test_render_does_not_duplicate_explicit_system_message() {
        let registry = TemplateRegistry::with_builtin_defaults();
        let messages = vec![
            ChatMessage::system("custom instructions"),
            ChatMessage::user("hi"),
        ];
        let rendered = registry.render_for_model("meta-llama/Llama-3-8b", &messages).expect("renders");
        assert_eq!(rendered.prompt.matches("<<SYS>>").count(), 1);
        assert!(rendered.prompt.contains("custom instructions"));
    }

    #[test]
    fn test_unsupported_construct_rejected_at_registration() {
        let err = ChatTemplate::compile(
            ChatTemplateFamily::Default,
            "{% while true %}x{% endwhile %}",
            vec![],
            false,
        )
        .expect_err("while is not in the grammar");
        assert!(matches!(err, TemplateError::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_unbalanced_if_rejected() {
        let err = ChatTemplate::compile(ChatTemplateFamily::Default, "{% if true %}x", vec![], false)
            .expect_err("unterminated if");
        assert!(matches!(err, TemplateError::UnbalancedBlock(_)));
    }

    #[test]
    fn test_equality_and_elif_branching() {
        let source = "{% for m in messages %}{% if m.role == \"user\" %}U:{{ m.content }}{% elif m.role == \"assistant\" %}A:{{ m.content }}{% else %}?{% endif %}{% endfor %}";
        let template = ChatTemplate::compile(ChatTemplateFamily::Default, source, vec![], false).expect("compiles");
        let messages = vec![ChatMessage::user("hi"), ChatMessage::assistant("yo")];
        let rendered = template.render(&messages).expect("renders");
        assert_eq!(rendered.prompt, "U:hiA:yo");
    }

    #[test]
    fn test_slicing() {
        let source = "{% for m in messages[1:] %}{{ m.content }}{% endfor %}";
        let template = ChatTemplate::compile(ChatTemplateFamily::Default, source, vec![], false).expect("compiles");
        let messages = vec![
            ChatMessage::user("first"),
            ChatMessage::user("second"),
            ChatMessage::user("third"),
        ];
        let rendered = template.render(&messages).expect("renders");
        assert_eq!(rendered.prompt, "secondthird");
    }
}
