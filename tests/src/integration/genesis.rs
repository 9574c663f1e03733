//! # Genesis
//!
//! From the `NETWORK_ID` setting to a composed genesis document.

#[cfg(test)]
mod tests {
    use lnh_03_genesis_composer::{
        CanonicalChainConfig, GenesisComposer, GenesisConfig, GenesisError, NetworkSelector,
        C_CHAIN_GENESIS_FIELD, CONFIG_FIELD,
    };
    use serde_json::Value;
    use shared_types::{KOPERNIKUS_ID, LOCAL_ID};

    fn compose_for(network_id: Option<&str>) -> Result<Value, GenesisError> {
        let value = network_id.map(str::to_string);
        let config = GenesisConfig::from_lookup(|_| value.clone())?;
        GenesisComposer::new(config.network_id).compose()
    }

    fn subchain_config(genesis: &Value) -> anyhow::Result<Value> {
        let encoded = genesis[C_CHAIN_GENESIS_FIELD]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("cChainGenesis is not a string"))?;
        let decoded: Value = serde_json::from_str(encoded)?;
        Ok(decoded[CONFIG_FIELD].clone())
    }

    #[test]
    fn test_unset_network_uses_default_document() -> anyhow::Result<()> {
        let genesis = compose_for(None)?;
        assert_eq!(genesis["networkID"], LOCAL_ID);
        assert_eq!(
            subchain_config(&genesis)?,
            serde_json::to_value(CanonicalChainConfig::local())?
        );
        Ok(())
    }

    #[test]
    fn test_kopernikus_by_id_and_name() -> anyhow::Result<()> {
        let by_id = compose_for(Some("1002"))?;
        let by_name = compose_for(Some("kopernikus"))?;
        assert_eq!(by_id, by_name);
        assert_eq!(by_id["networkID"], KOPERNIKUS_ID);
        assert_ne!(by_id, compose_for(None)?);
        assert_eq!(subchain_config(&by_id)?, subchain_config(&compose_for(None)?)?);
        Ok(())
    }

    #[test]
    fn test_invalid_network_setting() {
        assert!(matches!(
            compose_for(Some("atlantis")),
            Err(GenesisError::InvalidNetworkId(_))
        ));
    }

    #[test]
    fn test_composed_document_is_stable_text() -> anyhow::Result<()> {
        let composer = GenesisComposer::new(KOPERNIKUS_ID);
        assert_eq!(composer.selector(), NetworkSelector::Kopernikus);
        let first = serde_json::to_string_pretty(&composer.compose()?)?;
        let second = serde_json::to_string_pretty(&composer.compose()?)?;
        assert_eq!(first, second);
        Ok(())
    }
}
