//! Result model sent to the platform at the end of a run

use serde_json::{json, Map, Value};

use hobbit_bench_core::ResultStatistics;

use crate::ReportError;

const XSD_DOUBLE: &str = "xsd:double";
const XSD_LONG: &str = "xsd:long";

/// A single key performance indicator
#[derive(Debug, Clone, PartialEq)]
pub struct Kpi {
    /// Local name under the benchmark namespace
    pub name: &'static str,
    /// Literal value
    pub value: KpiValue,
}

/// Typed KPI literal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KpiValue {
    /// `xsd:double`
    Double(f64),
    /// `xsd:long`
    Long(u64),
}

/// KPIs of one experiment, serialized as a JSON-LD node
///
/// Undefined latency statistics (no task was answered) are left out of the
/// model rather than written as NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultModel {
    experiment_uri: String,
    namespace: String,
    kpis: Vec<Kpi>,
}

impl ResultModel {
    /// Build the model for an experiment from its statistics
    pub fn from_statistics(
        experiment_uri: impl Into<String>,
        namespace: impl Into<String>,
        stats: &ResultStatistics,
    ) -> Self {
        let mut kpis = Vec::with_capacity(5);

        if let Some(mean) = stats.mean_latency_millis {
            kpis.push(Kpi {
                name: "avgRuntime",
                value: KpiValue::Double(mean),
            });
        }
        if let Some(std_dev) = stats.std_dev_latency_millis {
            kpis.push(Kpi {
                name: "stdDevRuntime",
                value: KpiValue::Double(std_dev),
            });
        }
        kpis.push(Kpi {
            name: "testDataSize",
            value: KpiValue::Long(stats.test_set_size as u64),
        });
        kpis.push(Kpi {
            name: "faultyResponses",
            value: KpiValue::Long(stats.faulty_or_missing_count as u64),
        });
        if let Some(accuracy) = &stats.accuracy {
            kpis.push(Kpi {
                name: "accuracy",
                value: KpiValue::Double(accuracy.value),
            });
        }

        Self {
            experiment_uri: experiment_uri.into(),
            namespace: namespace.into(),
            kpis,
        }
    }

    /// The KPIs in the model
    pub fn kpis(&self) -> &[Kpi] {
        &self.kpis
    }

    /// Look up a KPI by local name
    pub fn kpi(&self, name: &str) -> Option<KpiValue> {
        self.kpis.iter().find(|k| k.name == name).map(|k| k.value)
    }

    /// Full IRI of a KPI
    pub fn property_iri(&self, name: &str) -> String {
        format!("{}{}", self.namespace, name)
    }

    /// JSON-LD representation
    pub fn to_json_ld(&self) -> Value {
        let mut node = Map::new();
        node.insert(
            "@context".into(),
            json!({
                "bench": self.namespace,
                "xsd": "http://www.w3.org/2001/XMLSchema#",
            }),
        );
        node.insert("@id".into(), Value::String(self.experiment_uri.clone()));

        for kpi in &self.kpis {
            let literal = match kpi.value {
                KpiValue::Double(v) => json!({ "@value": v, "@type": XSD_DOUBLE }),
                KpiValue::Long(v) => json!({ "@value": v, "@type": XSD_LONG }),
            };
            node.insert(format!("bench:{}", kpi.name), literal);
        }

        Value::Object(node)
    }

    /// Serialized JSON-LD, as carried by the benchmark-finished command
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReportError> {
        Ok(serde_json::to_vec(&self.to_json_ld())?)
    }
}
