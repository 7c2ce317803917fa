//! The category graph.
//!
//! Every category path is stored as a chain of [`PatternNode`]s. Word and
//! wildcard children share one map keyed by comparer-folded text (`*`, `_`,
//! `^` and `#` are reserved keys). Set children are kept in a separate list
//! whose insertion order is the order the search tries them in.
//!
//! The graph is append-only: inserting a path that already ends in a template
//! keeps the first template and hands it back to the caller.

use crate::config::Comparer;
use crate::pattern::PathToken;
use crate::template::Template;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Child {
    /// The token as first inserted, used for display.
    token: PathToken,
    node: PatternNode,
}

#[derive(Debug, Clone)]
struct SetChild {
    name: String,
    node: PatternNode,
}

/// A node of the category graph.
#[derive(Debug, Clone)]
pub struct PatternNode {
    comparer: Comparer,
    children: BTreeMap<String, Child>,
    set_children: Vec<SetChild>,
    template: Option<Arc<Template>>,
}

impl Default for PatternNode {
    fn default() -> Self {
        Self::new(Comparer::default())
    }
}

impl PatternNode {
    pub fn new(comparer: Comparer) -> Self {
        Self { comparer, children: BTreeMap::new(), set_children: Vec::new(), template: None }
    }

    pub fn comparer(&self) -> Comparer {
        self.comparer
    }

    /// The template stored at this node, if a category path ends here.
    pub fn template(&self) -> Option<&Arc<Template>> {
        self.template.as_ref()
    }

    /// The word or wildcard child keyed by `text`.
    pub fn child(&self, text: &str) -> Option<&PatternNode> {
        self.child_entry(text).map(|(_, node)| node)
    }

    /// Like [`PatternNode::child`], also returning the child's token as inserted.
    pub fn child_entry(&self, text: &str) -> Option<(&PathToken, &PatternNode)> {
        self.children.get(self.comparer.key(text).as_ref()).map(|c| (&c.token, &c.node))
    }

    /// Word and wildcard children, ordered by folded key.
    pub fn children(&self) -> impl Iterator<Item = (&PathToken, &PatternNode)> {
        self.children.values().map(|c| (&c.token, &c.node))
    }

    /// Set children in insertion order.
    pub fn set_children(&self) -> impl Iterator<Item = (&str, &PatternNode)> {
        self.set_children.iter().map(|c| (c.name.as_str(), &c.node))
    }

    pub fn get_or_add_child(&mut self, token: &PathToken) -> &mut PatternNode {
        let comparer = self.comparer;
        if token.is_set() {
            let index = match self.set_children.iter().position(|c| comparer.equals(&c.name, token.text())) {
                Some(index) => index,
                None => {
                    self.set_children.push(SetChild { name: token.text().to_string(), node: PatternNode::new(comparer) });
                    self.set_children.len() - 1
                }
            };
            return &mut self.set_children[index].node;
        }

        let key = comparer.key(token.text()).into_owned();
        &mut self.children.entry(key).or_insert_with(|| Child { token: token.clone(), node: PatternNode::new(comparer) }).node
    }

    pub fn try_get_child(&self, token: &PathToken) -> Option<&PatternNode> {
        if token.is_set() {
            self.set_children.iter().find(|c| self.comparer.equals(&c.name, token.text())).map(|c| &c.node)
        } else {
            self.child(token.text())
        }
    }

    pub fn try_get_path(&self, path: &[PathToken]) -> Option<&PatternNode> {
        path.iter().try_fold(self, |node, token| node.try_get_child(token))
    }

    /// Insert `template` at the end of `path`.
    ///
    /// Returns the template already stored there, if any; in that case the
    /// graph is left unchanged.
    pub fn add_child(&mut self, path: &[PathToken], template: Arc<Template>) -> Option<Arc<Template>> {
        let mut node = self;
        for token in path {
            node = node.get_or_add_child(token);
        }
        match &node.template {
            Some(existing) => Some(Arc::clone(existing)),
            None => {
                node.template = Some(template);
                None
            }
        }
    }

    /// Every template below this node with its space-separated path.
    pub fn templates(&self) -> Templates<'_> {
        Templates { stack: vec![(String::new(), self)] }
    }

    /// Number of templates below this node, this node included.
    pub fn len(&self) -> usize {
        let own = usize::from(self.template.is_some());
        own + self.children.values().map(|c| c.node.len()).sum::<usize>()
            + self.set_children.iter().map(|c| c.node.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_none() && self.children.is_empty() && self.set_children.is_empty()
    }
}

/// Depth-first iterator over `(path, template)` pairs. See [`PatternNode::templates`].
#[derive(Debug, Clone)]
pub struct Templates<'a> {
    stack: Vec<(String, &'a PatternNode)>,
}

impl<'a> Iterator for Templates<'a> {
    type Item = (String, &'a Arc<Template>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            let join = |segment: String| if path.is_empty() { segment } else { format!("{path} {segment}") };

            // Pushed in reverse so that word children come out first, in key order.
            for child in node.set_children.iter().rev() {
                self.stack.push((join(format!("<set>{}</set>", child.name)), &child.node));
            }
            for child in node.children.values().rev() {
                self.stack.push((join(child.token.to_string()), &child.node));
            }

            if let Some(template) = &node.template {
                return Some((path, template));
            }
        }
        None
    }
}
