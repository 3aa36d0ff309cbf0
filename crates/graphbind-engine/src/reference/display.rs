use std::fmt;

use graphbind_sdk::AssetRef;

use super::{Instance, MemberRef, SegmentItem, TargetKind};
use crate::token::{TypeToken, SIBLING_PREFIX};

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TargetKind::None => return write!(f, "(none)"),
            TargetKind::NullConstant => return write!(f, "null"),
            TargetKind::InlineValue => {
                return match &self.instance {
                    Instance::Value(value) => write!(f, "{}", value),
                    _ => write!(f, "(no value)"),
                }
            }
            _ => {}
        }

        match &self.instance {
            Instance::Ref(inner) => write!(f, "({}).", inner)?,
            Instance::Node(id) if self.kind.is_flow() => write!(f, "-> node {}.", id.0)?,
            Instance::Node(id) => write!(f, "node {}.", id.0)?,
            Instance::None | Instance::Value(_) => {}
        }

        for (index, segment) in self.path.iter().enumerate() {
            if index > 0 {
                write!(f, ".")?;
            }
            if index == 0 && (self.is_static || self.kind.is_type_only()) {
                match &self.start_type {
                    Some(token) => write!(f, "{}", attach(token, &self.external_refs))?,
                    None => write!(f, "{}", segment)?,
                }
            } else {
                write!(f, "{}", segment)?;
            }
            if let Some(Some(item)) = self.items.get(index) {
                self.write_item(f, item)?;
            }
        }
        Ok(())
    }
}

impl MemberRef {
    fn write_item(&self, f: &mut fmt::Formatter<'_>, item: &SegmentItem) -> fmt::Result {
        if !item.generic_args.is_empty() {
            write!(f, "<")?;
            self.write_list(f, &item.generic_args, &[])?;
            write!(f, ">")?;
        }
        if let Some(params) = &item.param_types {
            write!(f, "(")?;
            self.write_list(f, params, &item.generic_args)?;
            write!(f, ")")?;
        }
        Ok(())
    }

    fn write_list(
        &self,
        f: &mut fmt::Formatter<'_>,
        tokens: &[TypeToken],
        siblings: &[TypeToken],
    ) -> fmt::Result {
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let sibling = token
                .name
                .strip_prefix(SIBLING_PREFIX)
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(|n| siblings.get(n));
            match sibling {
                Some(generic) => write!(f, "{}", attach(generic, &self.external_refs))?,
                None => write!(f, "{}", attach(token, &self.external_refs))?,
            }
        }
        Ok(())
    }
}

/// Copy of `token` whose `@n` names render against `refs`
fn attach(token: &TypeToken, refs: &[AssetRef]) -> TypeToken {
    let references = if token.references.is_empty() {
        refs.to_vec()
    } else {
        token.references.clone()
    };
    TypeToken {
        name: token.name.clone(),
        parameters: token
            .parameters
            .iter()
            .map(|p| attach(p, &references))
            .collect(),
        references,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbind_sdk::{NodeId, Signature, Type, TypeDef, Value, VariableScope};

    #[test]
    fn test_simple_kinds() {
        assert_eq!(MemberRef::none().to_string(), "(none)");
        assert_eq!(MemberRef::null_constant(&Type::STRING).to_string(), "null");
        assert_eq!(MemberRef::inline_value(Value::I32(5)).to_string(), "5");
        assert_eq!(
            MemberRef::variable(VariableScope::Local, "speed", &Type::F32).to_string(),
            "speed"
        );
    }

    #[test]
    fn test_overloads_and_graph_types_are_annotated() {
        let enemy = Type::from_def(TypeDef::class("Enemy").graph_asset("a-1", "Enemy").build());
        let f = MemberRef::function("Spawn", &Signature::new(vec![enemy.clone(), Type::I32], Type::VOID));
        assert_eq!(f.to_string(), "Spawn(Enemy, i32)");

        let t = MemberRef::static_type(&Type::array_of(enemy));
        assert_eq!(t.to_string(), "Enemy[]");
    }

    #[test]
    fn test_node_prefix() {
        let r = MemberRef::node_output(NodeId(3), "result", &Type::I32);
        assert_eq!(r.to_string(), "node 3.result");
        assert_eq!(MemberRef::flow_node(NodeId(2)).to_string(), "-> node 2.entry");
    }
}
