//! Typed configuration models. The YAML schema is lenient where users
//! expect it to be (a single source or function may be given without the
//! surrounding list); the models normalize everything at load time.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;
use crate::function::ArgMap;
use crate::topic::TopicPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    Binary,
    String,
    #[default]
    Json,
}

/// One entry of a processor's function chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionConfig {
    pub name: String,
    pub arguments: ArgMap,
}

impl<'de> Deserialize<'de> for FunctionConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Full {
                name: String,
                #[serde(default)]
                arguments: Option<ArgMap>,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Name(name) => FunctionConfig {
                name,
                arguments: ArgMap::new(),
            },
            Raw::Full { name, arguments } => FunctionConfig {
                name,
                arguments: arguments.unwrap_or_default(),
            },
        })
    }
}

/// Accepts either a bare value or a list of values.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(item) => vec![item],
        OneOrMany::Many(items) => items,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub source: Vec<TopicPattern>,
    #[serde(default)]
    pub sink: Option<TopicPattern>,
    #[serde(deserialize_with = "one_or_many")]
    pub function: Vec<FunctionConfig>,
    #[serde(default)]
    pub input_format: MessageFormat,
    #[serde(default)]
    pub output_format: Option<MessageFormat>,
}

impl ProcessorConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub processors: Vec<ProcessorConfig>,
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        let config: Config = serde_yaml::from_str(text)?;
        config.finish()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    fn finish(mut self) -> Result<Self, Error> {
        for processor in &mut self.processors {
            if processor.source.is_empty() {
                return Err(Error::InvalidConfig(
                    "a processor needs at least one source".to_string(),
                ));
            }
            if processor.function.is_empty() {
                return Err(Error::InvalidConfig(
                    "a processor needs at least one function".to_string(),
                ));
            }
            for topic in processor.source.iter().chain(&processor.sink) {
                if !crate::topic::satisfies_grammar(topic.rule()) {
                    return Err(Error::InvalidTopic(topic.rule().to_string()));
                }
            }
            if processor.name.is_none() {
                let suffix: u32 = rand::random();
                processor.name = Some(format!("{}{}", processor.function[0].name, suffix));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test]
    fn single_source_and_function_coerce_to_lists() {
        let config = Config::from_yaml(
            r#"
processors:
  - source: p/source
    sink: p/sink
    function: dummy_str_concat1
"#,
        )
        .unwrap();

        let processor = &config.processors[0];
        assert_eq!(processor.source.len(), 1);
        assert_eq!(processor.source[0].rule(), "p/source");
        assert_eq!(processor.function.len(), 1);
        assert_eq!(processor.function[0].name, "dummy_str_concat1");
        assert!(processor.function[0].arguments.is_empty());
    }

    #[test]
    fn function_entries_mix_strings_and_maps() {
        let config = Config::from_yaml(
            r#"
processors:
  - source: [p/a, p/b]
    function:
      - first
      - name: second
        arguments:
          a: 5
          b: ten
      - name: third
"#,
        )
        .unwrap();

        let chain = &config.processors[0].function;
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[1].name, "second");
        assert_eq!(chain[1].arguments["a"], 5);
        assert_eq!(chain[1].arguments["b"], "ten");
        assert!(chain[2].arguments.is_empty());
    }

    #[test_case(None, MessageFormat::Json ; "defaults to json")]
    #[test_case(Some("binary"), MessageFormat::Binary ; "binary")]
    #[test_case(Some("string"), MessageFormat::String ; "string")]
    fn input_format(value: Option<&str>, expected: MessageFormat) {
        let line = value.map(|v| format!("    input_format: {v}\n")).unwrap_or_default();
        let yaml = format!(
            "processors:\n  - source: a/b\n    function: f\n{line}"
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.processors[0].input_format, expected);
        assert_eq!(config.processors[0].output_format, None);
    }

    #[test]
    fn missing_name_is_synthesized_from_the_first_function() {
        let config = Config::from_yaml(
            r#"
processors:
  - source: a/b
    function: [shrink, grow]
  - name: explicit
    source: a/b
    function: shrink
"#,
        )
        .unwrap();

        assert!(config.processors[0].name().starts_with("shrink"));
        assert_ne!(config.processors[0].name(), "shrink");
        assert_eq!(config.processors[1].name(), "explicit");
    }

    #[test]
    fn invalid_source_rule_fails_the_load() {
        let err = Config::from_yaml(
            r#"
processors:
  - source: "{w1/bad"
    function: f
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn empty_lists_are_rejected() {
        for yaml in [
            "processors:\n  - source: []\n    function: f\n",
            "processors:\n  - source: a/b\n    function: []\n",
        ] {
            assert!(matches!(
                Config::from_yaml(yaml),
                Err(Error::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn malformed_static_topics_are_rejected_at_load() {
        // The grammar applies to every declared topic, placeholders or
        // not, even though static rules would match verbatim at runtime.
        let err = Config::from_yaml(
            "processors:\n  - source: a//b\n    function: f\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTopic(_)));
    }

    #[test]
    fn sink_is_optional() {
        let config = Config::from_yaml(
            "processors:\n  - source: a/b\n    function: f\n",
        )
        .unwrap();
        assert_eq!(config.processors[0].sink, None);
    }
}
