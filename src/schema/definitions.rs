use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::NamedType;
use apollo_compiler::ast::Type;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::Schema;

use crate::error::FederationError;

/// Whether the name refers to an object, interface or union type of the schema. An unknown name
/// is an error rather than "not composite": callers only ever ask about types they just resolved.
pub(crate) fn is_composite_type(ty: &NamedType, schema: &Schema) -> Result<bool, FederationError> {
    let type_ = schema.types.get(ty).ok_or_else(|| {
        FederationError::internal(format!("Type \"{ty}\" unexpectedly missing from schema"))
    })?;
    Ok(type_.is_object() || type_.is_interface() || type_.is_union())
}

/// Whether two type references are written the same way: identical wrappers in identical order
/// around the same type name. Only names are compared, never the kinds behind them.
pub(crate) fn same_type(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Named(a_name), Type::Named(b_name))
        | (Type::NonNullNamed(a_name), Type::NonNullNamed(b_name)) => a_name == b_name,
        (Type::List(a_item), Type::List(b_item))
        | (Type::NonNullList(a_item), Type::NonNullList(b_item)) => same_type(a_item, b_item),
        _ => false,
    }
}

/// Tests whether `sub_type` is a (non-strict) subtype of `super_type`, following the standard
/// GraphQL covariance rules: non-null can narrow to non-null or widen from it, lists recurse, and
/// named types are subtypes when equal, when the supertype is an interface the subtype implements,
/// or when the supertype is a union containing the subtype. Named types are resolved in `schema`.
pub(crate) fn is_subtype(schema: &Schema, sub_type: &Type, super_type: &Type) -> bool {
    if super_type.is_non_null() {
        return sub_type.is_non_null()
            && is_subtype(
                schema,
                &(sub_type.clone().nullable()),
                &(super_type.clone().nullable()),
            );
    }
    if sub_type.is_non_null() {
        return is_subtype(schema, &(sub_type.clone().nullable()), super_type);
    }
    if super_type.is_list() {
        return sub_type.is_list() && is_subtype(schema, sub_type.item_type(), super_type.item_type());
    }
    if sub_type.is_list() {
        return false;
    }
    is_named_subtype(
        schema,
        sub_type.inner_named_type(),
        super_type.inner_named_type(),
    )
}

fn is_named_subtype(schema: &Schema, sub_type: &NamedType, super_type: &NamedType) -> bool {
    if sub_type == super_type {
        return true;
    }
    match schema.types.get(super_type) {
        Some(ExtendedType::Interface(_)) => match schema.types.get(sub_type) {
            Some(ExtendedType::Object(type_)) => type_
                .implements_interfaces
                .iter()
                .any(|itf| itf.name == *super_type),
            Some(ExtendedType::Interface(type_)) => type_
                .implements_interfaces
                .iter()
                .any(|itf| itf.name == *super_type),
            _ => false,
        },
        Some(ExtendedType::Union(type_)) => {
            type_.members.iter().any(|member| member.name == *sub_type)
        }
        _ => false,
    }
}

/// Tests whether `sub_field` is a structural subtype of `super_field`: same name, covariant
/// return type, and every argument of the supertype field present with the same type. This
/// relation is directional (it is not symmetric in general).
///
/// `sub_field` and `super_field` may come from different schemas; each field's type is resolved
/// against its own schema, with the subtype relation evaluated against the supertype's schema
/// (which is the one that knows the abstract types the subtype may narrow from).
pub(crate) fn is_structural_field_subtype(
    sub_field: &FieldDefinition,
    super_field: &FieldDefinition,
    super_schema: &Schema,
) -> bool {
    if sub_field.name != super_field.name {
        return false;
    }
    if !is_subtype(super_schema, &sub_field.ty, &super_field.ty) {
        return false;
    }
    super_field.arguments.iter().all(|super_arg| {
        sub_field
            .arguments
            .iter()
            .any(|sub_arg| sub_arg.name == super_arg.name && same_type(&sub_arg.ty, &super_arg.ty))
    })
}
