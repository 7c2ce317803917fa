//! Templates and the evaluation seam.
//!
//! A [`Template`] is created once when its category is loaded and shared,
//! read-only, by every match. Its content is a closed set of node kinds
//! ([`TemplateNode`]) plus an open [`ExtensionRegistry`] for hosts that need
//! more elements: an extension is looked up by element name while parsing and
//! becomes an [`Evaluate`] trait object.
//!
//! Only the elements the request pipeline itself depends on are built in:
//! captures (`star`, `thatstar`, `topicstar`), sub-requests (`srai`, `sr`),
//! predicates and variables (`get`, `set`), and `think`.

use crate::engine::RequestProcess;
use crate::error::{MatchError, PatternError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Anything that can be evaluated against a request to produce text.
pub trait Evaluate: fmt::Debug + Send + Sync {
    fn evaluate(&self, process: &mut RequestProcess<'_>) -> Result<String, MatchError>;
}

/// One element of template content.
#[derive(Debug, Clone)]
pub enum TemplateNode {
    Text(String),
    /// One-based index into the message captures.
    Star(usize),
    ThatStar(usize),
    TopicStar(usize),
    /// Evaluate the content, then process it as a sub-request.
    Srai(TemplateContent),
    Get { name: String, local: bool },
    Set { name: String, local: bool, content: TemplateContent },
    /// Evaluate for side effects only.
    Think(TemplateContent),
    Extension(Arc<dyn Evaluate>),
}

impl Evaluate for TemplateNode {
    fn evaluate(&self, process: &mut RequestProcess<'_>) -> Result<String, MatchError> {
        match self {
            TemplateNode::Text(text) => Ok(text.clone()),
            TemplateNode::Star(index) => Ok(process.star(*index).to_string()),
            TemplateNode::ThatStar(index) => Ok(process.that_star(*index).to_string()),
            TemplateNode::TopicStar(index) => Ok(process.topic_star(*index).to_string()),
            TemplateNode::Srai(content) => {
                let input = content.evaluate(process)?;
                process.srai(input.trim())
            }
            TemplateNode::Get { name, local: true } => Ok(process.variable(name).to_string()),
            TemplateNode::Get { name, local: false } => Ok(process.predicate(name).to_string()),
            TemplateNode::Set { name, local, content } => {
                let value = content.evaluate(process)?.trim().to_string();
                if *local {
                    process.set_variable(name, &value);
                } else {
                    process.set_predicate(name, &value);
                }
                Ok(value)
            }
            TemplateNode::Think(content) => content.evaluate(process).map(|_| String::new()),
            TemplateNode::Extension(extension) => extension.evaluate(process),
        }
    }
}

/// An ordered sequence of template nodes.
#[derive(Debug, Clone, Default)]
pub struct TemplateContent {
    nodes: Vec<TemplateNode>,
}

impl TemplateContent {
    pub fn new(nodes: Vec<TemplateNode>) -> Self {
        Self { nodes }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self { nodes: vec![TemplateNode::Text(text.into())] }
    }

    pub fn nodes(&self) -> &[TemplateNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parse template markup, resolving unknown elements through `registry`.
    pub fn parse(markup: &str, registry: &ExtensionRegistry) -> Result<Self, PatternError> {
        let tags = crate::regex!(r#"<(/?)([A-Za-z_][\w.-]*)((?:\s+[\w:-]+\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)>"#);

        struct Frame {
            name: String,
            attributes: Vec<(String, String)>,
            nodes: Vec<TemplateNode>,
        }

        let mut stack = vec![Frame { name: String::new(), attributes: Vec::new(), nodes: Vec::new() }];
        let mut pos = 0;

        for caps in tags.captures_iter(markup) {
            let Some(whole) = caps.get(0) else { continue };
            if let Some(frame) = stack.last_mut() {
                push_text(&mut frame.nodes, &markup[pos..whole.start()]);
            }
            pos = whole.end();

            let name = caps[2].to_ascii_lowercase();
            if !caps[1].is_empty() {
                if stack.len() == 1 || stack.last().is_some_and(|f| f.name != name) {
                    return Err(PatternError::UnexpectedClose { element: name });
                }
                let Some(frame) = stack.pop() else { break };
                let node = build_node(frame.name, frame.attributes, TemplateContent::new(frame.nodes), registry)?;
                if let Some(parent) = stack.last_mut() {
                    parent.nodes.push(node);
                }
                continue;
            }

            let attributes = parse_attributes(&caps[3]);
            if caps[4].is_empty() {
                stack.push(Frame { name, attributes, nodes: Vec::new() });
            } else {
                let node = build_node(name, attributes, TemplateContent::default(), registry)?;
                if let Some(parent) = stack.last_mut() {
                    parent.nodes.push(node);
                }
            }
        }

        if stack.len() > 1 {
            let element = stack.pop().map(|f| f.name).unwrap_or_default();
            return Err(PatternError::Unterminated { element });
        }
        let mut root = stack.pop().map(|f| f.nodes).unwrap_or_default();
        push_text(&mut root, &markup[pos..]);
        Ok(Self { nodes: root })
    }
}

impl Evaluate for TemplateContent {
    fn evaluate(&self, process: &mut RequestProcess<'_>) -> Result<String, MatchError> {
        let mut out = String::new();
        for node in &self.nodes {
            out.push_str(&node.evaluate(process)?);
        }
        Ok(out)
    }
}

fn push_text(nodes: &mut Vec<TemplateNode>, text: &str) {
    if !text.is_empty() {
        nodes.push(TemplateNode::Text(text.to_string()));
    }
}

fn parse_attributes(source: &str) -> Vec<(String, String)> {
    let re = crate::regex!(r#"([\w:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#);
    re.captures_iter(source)
        .map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str()).unwrap_or_default();
            (caps[1].to_ascii_lowercase(), value.to_string())
        })
        .collect()
}

fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
}

fn index(element: &str, attributes: &[(String, String)]) -> Result<usize, PatternError> {
    match attribute(attributes, "index") {
        None => Ok(1),
        Some(value) => match value.trim().parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(PatternError::InvalidIndex { element: element.to_string(), value: value.to_string() }),
        },
    }
}

fn target(element: &str, attributes: &[(String, String)]) -> Result<(String, bool), PatternError> {
    if let Some(name) = attribute(attributes, "name") {
        Ok((name.to_string(), false))
    } else if let Some(var) = attribute(attributes, "var") {
        Ok((var.to_string(), true))
    } else {
        Err(PatternError::MissingAttribute { element: element.to_string(), attribute: "name" })
    }
}

fn build_node(
    name: String,
    attributes: Vec<(String, String)>,
    children: TemplateContent,
    registry: &ExtensionRegistry,
) -> Result<TemplateNode, PatternError> {
    let node = match name.as_str() {
        "star" => TemplateNode::Star(index(&name, &attributes)?),
        "thatstar" => TemplateNode::ThatStar(index(&name, &attributes)?),
        "topicstar" => TemplateNode::TopicStar(index(&name, &attributes)?),
        "sr" => TemplateNode::Srai(TemplateContent::new(vec![TemplateNode::Star(1)])),
        "srai" => TemplateNode::Srai(children),
        "think" => TemplateNode::Think(children),
        "get" => {
            let (name, local) = target(&name, &attributes)?;
            TemplateNode::Get { name, local }
        }
        "set" => {
            let (name, local) = target(&name, &attributes)?;
            TemplateNode::Set { name, local, content: children }
        }
        _ => match registry.get(&name) {
            Some(constructor) => {
                TemplateNode::Extension(constructor(ExtensionElement { name, attributes, children })?)
            }
            None => return Err(PatternError::InvalidElement { element: name, context: "template" }),
        },
    };
    Ok(node)
}

/// A parsed extension element handed to its constructor.
#[derive(Debug, Clone)]
pub struct ExtensionElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: TemplateContent,
}

impl ExtensionElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        attribute(&self.attributes, name)
    }
}

pub type ExtensionConstructor =
    Arc<dyn Fn(ExtensionElement) -> Result<Arc<dyn Evaluate>, PatternError> + Send + Sync>;

const BUILT_IN: &[&str] = &["star", "thatstar", "topicstar", "sr", "srai", "think", "get", "set"];

/// Template elements registered by the host, by lowercase element name.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    constructors: HashMap<String, ExtensionConstructor>,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ExtensionRegistry").field("elements", &names).finish()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `<name>`. Built-in and already registered
    /// names are rejected.
    pub fn register<F>(&mut self, name: &str, constructor: F) -> Result<(), PatternError>
    where
        F: Fn(ExtensionElement) -> Result<Arc<dyn Evaluate>, PatternError> + Send + Sync + 'static,
    {
        let name = name.to_ascii_lowercase();
        if BUILT_IN.contains(&name.as_str()) || self.constructors.contains_key(&name) {
            return Err(PatternError::DuplicateExtension(name));
        }
        self.constructors.insert(name, Arc::new(constructor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ExtensionConstructor> {
        self.constructors.get(&name.to_ascii_lowercase())
    }
}

/// An immutable response template with its load location.
#[derive(Debug, Clone, Default)]
pub struct Template {
    content: TemplateContent,
    source_uri: Option<String>,
    line_number: Option<u32>,
}

impl Template {
    pub fn new(content: TemplateContent) -> Self {
        Self { content, source_uri: None, line_number: None }
    }

    /// A template that evaluates to fixed text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(TemplateContent::text(text))
    }

    pub fn with_source(mut self, uri: impl Into<String>, line_number: u32) -> Self {
        self.source_uri = Some(uri.into());
        self.line_number = Some(line_number);
        self
    }

    pub fn content(&self) -> &TemplateContent {
        &self.content
    }

    pub fn source_uri(&self) -> Option<&str> {
        self.source_uri.as_deref()
    }

    pub fn line_number(&self) -> Option<u32> {
        self.line_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Upper(TemplateContent);

    impl Evaluate for Upper {
        fn evaluate(&self, process: &mut RequestProcess<'_>) -> Result<String, MatchError> {
            Ok(self.0.evaluate(process)?.to_uppercase())
        }
    }

    fn registry() -> ExtensionRegistry {
        let mut registry = ExtensionRegistry::new();
        registry
            .register("uppercase", |element: ExtensionElement| Ok(Arc::new(Upper(element.children)) as Arc<dyn Evaluate>))
            .unwrap();
        registry
    }

    #[test]
    fn parses_builtin_elements() {
        let content =
            TemplateContent::parse(r#"Hi <star/>, <thatstar index="2"/><srai>X <star index='3'/></srai><sr/>"#, &registry())
                .unwrap();
        let nodes = content.nodes();
        assert_eq!(nodes.len(), 6);
        assert!(matches!(&nodes[0], TemplateNode::Text(t) if t == "Hi "));
        assert!(matches!(nodes[1], TemplateNode::Star(1)));
        assert!(matches!(nodes[3], TemplateNode::ThatStar(2)));
        match &nodes[4] {
            TemplateNode::Srai(inner) => {
                assert_eq!(inner.nodes().len(), 2);
                assert!(matches!(inner.nodes()[1], TemplateNode::Star(3)));
            }
            other => panic!("expected srai, got {other:?}"),
        }
        assert!(matches!(&nodes[5], TemplateNode::Srai(inner) if matches!(inner.nodes(), [TemplateNode::Star(1)])));
    }

    #[test]
    fn parses_predicates_and_variables() {
        let content =
            TemplateContent::parse(r#"<think><set var="x">1</set></think><get name="topic"/><set name="mood">ok</set>"#, &registry())
                .unwrap();
        let nodes = content.nodes();
        assert!(matches!(&nodes[0], TemplateNode::Think(inner) if matches!(&inner.nodes()[0], TemplateNode::Set { local: true, .. })));
        assert!(matches!(&nodes[1], TemplateNode::Get { name, local: false } if name == "topic"));
        assert!(matches!(&nodes[2], TemplateNode::Set { name, local: false, .. } if name == "mood"));
    }

    #[test]
    fn resolves_extensions_through_registry() {
        let content = TemplateContent::parse("<uppercase>hi <star/></uppercase>", &registry()).unwrap();
        assert!(matches!(content.nodes(), [TemplateNode::Extension(_)]));

        let err = TemplateContent::parse("<uppercase/>", &ExtensionRegistry::new()).unwrap_err();
        assert_eq!(err, PatternError::InvalidElement { element: "uppercase".to_string(), context: "template" });
    }

    #[test]
    fn rejects_malformed_markup() {
        let registry = registry();
        assert!(matches!(TemplateContent::parse("<srai>x", &registry), Err(PatternError::Unterminated { .. })));
        assert!(matches!(TemplateContent::parse("x</srai>", &registry), Err(PatternError::UnexpectedClose { .. })));
        assert!(matches!(TemplateContent::parse("<think>x</srai>", &registry), Err(PatternError::UnexpectedClose { .. })));
        assert!(matches!(TemplateContent::parse(r#"<star index="0"/>"#, &registry), Err(PatternError::InvalidIndex { .. })));
        assert!(matches!(TemplateContent::parse("<get/>", &registry), Err(PatternError::MissingAttribute { .. })));
    }

    #[test]
    fn registry_rejects_duplicates_and_builtins() {
        let mut registry = registry();
        let ctor = |element: ExtensionElement| Ok(Arc::new(Upper(element.children)) as Arc<dyn Evaluate>);
        assert_eq!(registry.register("UPPERCASE", ctor), Err(PatternError::DuplicateExtension("uppercase".to_string())));
        assert_eq!(registry.register("srai", ctor), Err(PatternError::DuplicateExtension("srai".to_string())));
    }

    #[test]
    fn template_keeps_source_location() {
        let template = Template::text("hello").with_source("greetings.aiml", 12);
        assert_eq!(template.source_uri(), Some("greetings.aiml"));
        assert_eq!(template.line_number(), Some(12));
        assert!(matches!(template.content().nodes(), [TemplateNode::Text(t)] if t == "hello"));
    }
}
