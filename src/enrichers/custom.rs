//! Custom SQL definitions

use crate::context::SharedSchemaContext;
use crate::enrichers::SharedSchemaContextEnricher;
use crate::error::Result;
use crate::request::SharedSchemaContextRequest;
use crate::types::CustomSqlDefinitionPosition;

/// Appends the caller's custom definitions registered for one position
///
/// The default chain places one instance first and one last. Definitions
/// registered under a `Custom` label are only emitted when the caller places
/// an enricher for that label in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSqlDefinitionsEnricher {
    position: CustomSqlDefinitionPosition,
    name: String,
}

impl CustomSqlDefinitionsEnricher {
    pub fn new(position: CustomSqlDefinitionPosition) -> Self {
        let name = match &position {
            CustomSqlDefinitionPosition::AtBeginning => {
                "custom_sql_definitions:at_beginning".to_string()
            }
            CustomSqlDefinitionPosition::AtEnd => "custom_sql_definitions:at_end".to_string(),
            CustomSqlDefinitionPosition::Custom(label) => {
                format!("custom_sql_definitions:{}", label)
            }
        };
        Self { position, name }
    }

    pub fn position(&self) -> &CustomSqlDefinitionPosition {
        &self.position
    }
}

impl SharedSchemaContextEnricher for CustomSqlDefinitionsEnricher {
    fn name(&self) -> &str {
        &self.name
    }

    fn enrich(
        &self,
        mut context: SharedSchemaContext,
        request: &SharedSchemaContextRequest,
    ) -> Result<SharedSchemaContext> {
        for pair in &request.custom_sql_definitions {
            if pair.position == self.position {
                context.add_sql_definition(pair.definition.clone());
            }
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::definition::SqlDefinition;
    use crate::types::CustomSqlDefinitionPair;

    fn request() -> SharedSchemaContextRequest {
        let mut request = SharedSchemaContextRequest::default();
        for (position, script) in [
            (CustomSqlDefinitionPosition::AtEnd, "SELECT 'end';"),
            (CustomSqlDefinitionPosition::AtBeginning, "SELECT 'first';"),
            (
                CustomSqlDefinitionPosition::Custom("audit".to_string()),
                "SELECT 'audit';",
            ),
            (CustomSqlDefinitionPosition::AtBeginning, "SELECT 'second';"),
        ] {
            request.custom_sql_definitions.push(CustomSqlDefinitionPair {
                position,
                definition: SqlDefinition::from_create_script(script),
            });
        }
        request
    }

    #[test]
    fn test_only_matching_position_in_registration_order() {
        let enricher = CustomSqlDefinitionsEnricher::new(CustomSqlDefinitionPosition::AtBeginning);
        let context = enricher
            .enrich(SharedSchemaContext::new(), &request())
            .unwrap();
        assert_eq!(
            context.create_scripts(),
            vec!["SELECT 'first';", "SELECT 'second';"]
        );
    }

    #[test]
    fn test_custom_label() {
        let enricher = CustomSqlDefinitionsEnricher::new(CustomSqlDefinitionPosition::Custom(
            "audit".to_string(),
        ));
        assert_eq!(enricher.name(), "custom_sql_definitions:audit");
        let context = enricher
            .enrich(SharedSchemaContext::new(), &request())
            .unwrap();
        assert_eq!(context.create_scripts(), vec!["SELECT 'audit';"]);
    }

    #[test]
    fn test_appends_after_existing_definitions() {
        let mut context = SharedSchemaContext::new();
        context.add_sql_definition(SqlDefinition::from_create_script("SELECT 'existing';"));
        let enricher = CustomSqlDefinitionsEnricher::new(CustomSqlDefinitionPosition::AtEnd);
        let context = enricher.enrich(context, &request()).unwrap();
        assert_eq!(
            context.create_scripts(),
            vec!["SELECT 'existing';", "SELECT 'end';"]
        );
    }
}
