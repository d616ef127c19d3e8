use std::fmt::Display;
use std::fmt::Formatter;

use apollo_compiler::executable::FieldSet;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::schema::NamedType;
use apollo_compiler::NodeStr;

use crate::error::FederationError;
use crate::schema::ValidFederationSchema;

// TODO: In the JS codebase, this optionally runs an additional validation to forbid aliases, and
// has some error-rewriting to help give the user better hints around non-existent fields.
pub(crate) fn parse_field_set(
    schema: &ValidFederationSchema,
    parent_type_name: NamedType,
    value: NodeStr,
) -> Result<SelectionSet, FederationError> {
    // Note this parsing takes care of adding curly braces ("{" and "}") if they aren't in the
    // string.
    let field_set = FieldSet::parse_and_validate(
        schema.schema(),
        parent_type_name,
        value.as_str(),
        "field_set.graphql",
    )?;
    Ok(field_set.into_inner().selection_set)
}

/// Returns the union of two selection sets, recursively merging selections that select the same
/// thing. Neither input is modified. For the directive-free field sets this crate deals in, the
/// operation is commutative and idempotent.
pub(crate) fn merge_selection_sets(a: &SelectionSet, b: &SelectionSet) -> SelectionSet {
    let mut merged = a.clone();
    merge_into(&mut merged, b);
    merged
}

fn merge_into(dst: &mut SelectionSet, src: &SelectionSet) {
    for selection in &src.selections {
        match selection {
            Selection::Field(src_field) => {
                let src_key = src_field.alias.as_ref().unwrap_or(&src_field.name);
                let existing = dst.selections.iter().position(|sel| {
                    matches!(
                        sel,
                        Selection::Field(dst_field)
                            if dst_field.alias.as_ref().unwrap_or(&dst_field.name) == src_key
                    )
                });
                match existing {
                    Some(index) => {
                        if let Selection::Field(dst_field) = &mut dst.selections[index] {
                            merge_into(
                                &mut dst_field.make_mut().selection_set,
                                &src_field.selection_set,
                            );
                        }
                    }
                    None => dst.selections.push(Selection::Field(src_field.clone())),
                }
            }
            Selection::InlineFragment(src_fragment) => {
                let existing = dst.selections.iter().position(|sel| {
                    matches!(
                        sel,
                        Selection::InlineFragment(dst_fragment)
                            if dst_fragment.type_condition == src_fragment.type_condition
                    )
                });
                match existing {
                    Some(index) => {
                        if let Selection::InlineFragment(dst_fragment) = &mut dst.selections[index]
                        {
                            merge_into(
                                &mut dst_fragment.make_mut().selection_set,
                                &src_fragment.selection_set,
                            );
                        }
                    }
                    None => dst
                        .selections
                        .push(Selection::InlineFragment(src_fragment.clone())),
                }
            }
            // Field sets cannot contain named fragment spreads, but merging is total regardless.
            Selection::FragmentSpread(_) => dst.selections.push(selection.clone()),
        }
    }
}

/// Renders a selection set on a single line, in the `{ a b { c } }` form used by edge labels.
pub(crate) struct DisplaySelectionSet<'a>(pub(crate) &'a SelectionSet);

impl Display for DisplaySelectionSet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_selection_set(f, self.0)
    }
}

fn write_selection_set(
    f: &mut Formatter<'_>,
    selection_set: &SelectionSet,
) -> std::fmt::Result {
    write!(f, "{{")?;
    for selection in &selection_set.selections {
        write!(f, " ")?;
        match selection {
            Selection::Field(field) => {
                if let Some(alias) = &field.alias {
                    write!(f, "{}: ", alias)?;
                }
                write!(f, "{}", field.name)?;
                if !field.selection_set.selections.is_empty() {
                    write!(f, " ")?;
                    write_selection_set(f, &field.selection_set)?;
                }
            }
            Selection::InlineFragment(fragment) => {
                match &fragment.type_condition {
                    Some(type_condition) => write!(f, "... on {}", type_condition)?,
                    None => write!(f, "...")?,
                }
                write!(f, " ")?;
                write_selection_set(f, &fragment.selection_set)?;
            }
            Selection::FragmentSpread(spread) => {
                write!(f, "...{}", spread.fragment_name)?;
            }
        }
    }
    write!(f, " }}")
}
