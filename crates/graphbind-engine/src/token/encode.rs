use graphbind_sdk::{AssetRef, CompositeType, ParamMode, Type, TypeDef};

use super::{
    TypeToken, ARRAY_PREFIX, EXTERNAL_PREFIX, FUNCTION_NAME, GENERIC_PREFIX, OUT_PARAM_PREFIX,
    REF_PARAM_PREFIX, SIBLING_PREFIX, UNINDEXED_GRAPH,
};

impl TypeToken {
    /// Encode `ty`, appending the assets of graph types to `refs`
    pub fn encode(ty: &Type, refs: &mut Vec<AssetRef>) -> TypeToken {
        Self::encode_in_segment(ty, &[], refs)
    }

    /// Encode `ty` for a path segment whose generic arguments are
    /// `segment_generics`; occurrences of those arguments become `#n`
    pub fn encode_in_segment(
        ty: &Type,
        segment_generics: &[Type],
        refs: &mut Vec<AssetRef>,
    ) -> TypeToken {
        if let Some(i) = segment_generics.iter().position(|g| g == ty) {
            return TypeToken::named(format!("{}{}", SIBLING_PREFIX, i));
        }
        let nested = |t: &Type, refs: &mut Vec<AssetRef>| Self::encode_in_segment(t, segment_generics, refs);

        match ty {
            Type::Primitive(p) => TypeToken::named(p.name()),
            Type::Host(def) => TypeToken::named(def.name()),
            Type::Graph(def) => TypeToken::named(graph_name(def, refs)),
            Type::Generic(def, args) => TypeToken::with_parameters(
                definition_name(def, refs),
                args.iter().map(|a| nested(a, refs)).collect(),
            ),
            Type::Array(element) => array_token(nested(element, refs)),
            Type::Composite(composite) => match composite.as_ref() {
                CompositeType::ArrayOf(element) => array_token(nested(element, refs)),
                CompositeType::GenericOf {
                    definition,
                    arguments,
                } => TypeToken::with_parameters(
                    definition_name(definition, refs),
                    arguments.iter().map(|a| nested(a, refs)).collect(),
                ),
            },
            Type::Function(sig) => {
                let mut parameters = vec![nested(&sig.ret, refs)];
                for p in &sig.params {
                    let mut token = nested(&p.ty, refs);
                    match p.mode {
                        ParamMode::In => {}
                        ParamMode::Ref => token.name.insert(0, REF_PARAM_PREFIX),
                        ParamMode::Out => token.name.insert(0, OUT_PARAM_PREFIX),
                    }
                    parameters.push(token);
                }
                TypeToken::with_parameters(FUNCTION_NAME, parameters)
            }
            Type::Param(name) => TypeToken::named(format!("{}{}", GENERIC_PREFIX, name)),
            // Keep the unresolved name so a later load can still find it.
            Type::Missing(name) => TypeToken::named(name.to_string()),
        }
    }

    /// Encode `ty` with its asset references carried by the token itself
    pub fn standalone(ty: &Type) -> TypeToken {
        let mut refs = Vec::new();
        let mut token = Self::encode(ty, &mut refs);
        token.references = refs;
        token
    }
}

fn array_token(mut element: TypeToken) -> TypeToken {
    element.name.insert(0, ARRAY_PREFIX);
    element
}

fn definition_name(def: &TypeDef, refs: &mut Vec<AssetRef>) -> String {
    if def.is_graph() {
        graph_name(def, refs)
    } else {
        def.name().to_string()
    }
}

fn graph_name(def: &TypeDef, refs: &mut Vec<AssetRef>) -> String {
    let Some(asset) = def.asset() else {
        return UNINDEXED_GRAPH.to_string();
    };
    let index = match refs.iter().position(|r| r == asset) {
        Some(i) => i,
        None => {
            refs.push(asset.clone());
            refs.len() - 1
        }
    };
    format!("{}{}", EXTERNAL_PREFIX, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbind_sdk::{ParamSig, Signature};

    #[test]
    fn test_generic_array_encoding() {
        let list = TypeDef::class("List").generic_params(&["T"]).build();
        let ty = Type::array_of(Type::generic_of(list, vec![Type::I32]));
        let token = TypeToken::encode(&ty, &mut Vec::new());

        assert_eq!(token.name, "?List");
        assert_eq!(token.parameters, vec![TypeToken::named("i32")]);
        assert_eq!(token.to_string(), "List<i32>[]");
    }

    #[test]
    fn test_graph_types_share_reference_slots() {
        let enemy = TypeDef::class("Enemy").graph_asset("a-1", "Enemy").build();
        let ty = Type::from_def(enemy);
        let mut refs = Vec::new();

        let first = TypeToken::encode(&ty, &mut refs);
        let second = TypeToken::encode(&Type::array_of(ty), &mut refs);
        assert_eq!(first.name, "@0");
        assert_eq!(second.name, "?@0");
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_function_parameter_modes() {
        let sig = Signature {
            params: vec![
                ParamSig::new(Type::I32),
                ParamSig::with_mode(Type::I32, ParamMode::Out),
            ],
            ret: Type::BOOL,
        };
        let token = TypeToken::encode(&Type::function(sig), &mut Vec::new());

        assert_eq!(token.name, "fn");
        let names: Vec<&str> = token.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bool", "i32", "^i32"]);
        assert_eq!(token.to_string(), "fn(i32, out i32) -> bool");
    }

    #[test]
    fn test_segment_generic_arguments_become_sibling_indices() {
        let token = TypeToken::encode_in_segment(&Type::STRING, &[Type::I32, Type::STRING], &mut Vec::new());
        assert_eq!(token.name, "#1");
    }
}
