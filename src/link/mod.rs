pub(crate) mod federation_spec_definition;
