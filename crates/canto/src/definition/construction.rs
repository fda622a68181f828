use super::DefId;
use crate::parser::{Expression, Literal, NamePartSyntax, Spanned};
use std::fmt;
use std::ops::Range;

/// Evaluable node of a definition body.
#[derive(Debug, Clone, PartialEq)]
pub enum Construction {
    Literal(Literal),
    Reference(Instantiation),
    Array(Vec<Construction>),
    Table(Vec<(String, Construction)>),
}

impl Construction {
    /// Calls `f` on every instantiation in this construction, outermost first.
    pub fn for_each_instantiation<'a>(&'a self, f: &mut impl FnMut(&'a Instantiation)) {
        match self {
            Construction::Literal(_) => {}
            Construction::Reference(instantiation) => {
                f(instantiation);
                for part in &instantiation.parts {
                    for argument in part.arguments.iter().flatten() {
                        argument.for_each_instantiation(f);
                    }
                    for index in &part.indexes {
                        index.for_each_instantiation(f);
                    }
                }
            }
            Construction::Array(items) => {
                for item in items {
                    item.for_each_instantiation(f);
                }
            }
            Construction::Table(entries) => {
                for (_, value) in entries {
                    value.for_each_instantiation(f);
                }
            }
        }
    }

    pub fn as_reference(&self) -> Option<&Instantiation> {
        match self {
            Construction::Reference(instantiation) => Some(instantiation),
            _ => None,
        }
    }
}

impl From<&Spanned<Expression>> for Construction {
    fn from(expression: &Spanned<Expression>) -> Self {
        match &expression.node {
            Expression::Literal(literal) => Construction::Literal(literal.clone()),
            Expression::Reference(parts) => Construction::Reference(Instantiation {
                parts: parts.iter().map(NamePart::from).collect(),
                span: expression.span.into_range(),
            }),
            Expression::Array(items) => {
                Construction::Array(items.iter().map(Construction::from).collect())
            }
            Expression::Table(entries) => Construction::Table(
                entries
                    .iter()
                    .map(|(key, value)| (key.node.clone(), Construction::from(value)))
                    .collect(),
            ),
        }
    }
}

/// What a name part was bound to by the resolve pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Definition(DefId),
    /// `index`-th parameter of `owner`.
    Parameter { owner: DefId, index: usize },
    /// Looked up on the value of the previous part at construction time.
    Member,
}

/// Dotted reference such as `page(1).rows[2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Instantiation {
    pub parts: Vec<NamePart>,
    pub span: Range<usize>,
}

impl Instantiation {
    /// Unresolved instantiation of a dotted name without arguments.
    pub fn from_path(path: &str) -> Self {
        Self {
            parts: path.split('.').map(NamePart::named).collect(),
            span: 0..0,
        }
    }

    pub fn first(&self) -> Option<&NamePart> {
        self.parts.first()
    }

    /// Target of the last part, the definition this instantiation denotes.
    pub fn target(&self) -> Option<Target> {
        self.parts.last().and_then(|part| part.target)
    }

    pub fn definition(&self) -> Option<DefId> {
        match self.target() {
            Some(Target::Definition(id)) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Instantiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, part) in self.parts.iter().enumerate() {
            if index > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", part.name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamePart {
    pub name: String,
    /// `None` when the part was written without parentheses.
    pub arguments: Option<Vec<Construction>>,
    pub indexes: Vec<Construction>,
    pub target: Option<Target>,
    pub span: Range<usize>,
}

impl NamePart {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            arguments: None,
            indexes: Vec::new(),
            target: None,
            span: 0..0,
        }
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.as_ref().map_or(0, Vec::len)
    }
}

impl From<&Spanned<NamePartSyntax>> for NamePart {
    fn from(part: &Spanned<NamePartSyntax>) -> Self {
        Self {
            name: part.node.name.clone(),
            arguments: part
                .node
                .arguments
                .as_ref()
                .map(|arguments| arguments.iter().map(Construction::from).collect()),
            indexes: part.node.indexes.iter().map(Construction::from).collect(),
            target: None,
            span: part.span.into_range(),
        }
    }
}
