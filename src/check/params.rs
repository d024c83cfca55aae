//! Job parameter templates used by the service check

use serde_json::{json, Value};

use crate::config::{CheckSettings, PresencePoint};
use crate::job::JobKind;

/// WGS84 in WKT, as the service expects for point sets
pub const WGS84_WKT: &str = "GEOGCS['WGS84', DATUM['WGS84', SPHEROID['WGS84', 6378137.0, 298.257223563]], PRIMEM['Greenwich', 0.0], UNIT['degree', 0.017453292519943295], AXIS['Longitude',EAST], AXIS['Latitude',NORTH]]";

const PRESENCE_LABEL: &str = "omws-check";

fn environment(settings: &CheckSettings) -> Value {
    let maps: Vec<Value> = settings.layers.iter().map(|id| json!({"Id": id})).collect();
    json!({
        "Map": maps,
        "Mask": {"Id": settings.layers[0]}
    })
}

fn presence(points: &[PresencePoint]) -> Value {
    json!({
        "Label": PRESENCE_LABEL,
        "CoordinateSystem": WGS84_WKT,
        "Point": points
    })
}

fn sampler(settings: &CheckSettings, points: &[PresencePoint]) -> Value {
    json!({
        "Environment": environment(settings),
        "Presence": presence(points)
    })
}

fn confusion_matrix() -> Value {
    json!({"ConfusionMatrix": {"Threshold": 0.5}})
}

/// Submission payload for `kind`
///
/// `model` is the serialized model returned by a previous model creation;
/// kinds that need one get it as their `Algorithm` element.
pub fn job_params(kind: JobKind, settings: &CheckSettings, model: Option<&Value>) -> Value {
    let mut params = match kind {
        JobKind::CreateModel => json!({
            "Sampler": sampler(settings, &settings.points),
            "Algorithm": {
                "Id": settings.required_algorithm,
                "Version": "0.2",
                "Parameters": {
                    "Parameter": [{"Id": "StandardDeviationCutoff", "Value": "0.8"}]
                }
            },
            "Statistics": confusion_matrix()
        }),
        JobKind::TestModel => json!({
            "Sampler": sampler(settings, &settings.test_points),
            "Statistics": confusion_matrix()
        }),
        JobKind::ProjectModel => json!({
            "Environment": environment(settings),
            "OutputParameters": {
                "FileType": "ByteHFA",
                "TemplateLayer": {"Id": settings.layers[0]}
            },
            "Statistics": {"AreaStatistics": {"PredictionThreshold": 0.5}}
        }),
        JobKind::EvaluateModel => json!({
            "Sampler": sampler(settings, &settings.test_points)
        }),
        JobKind::SamplePoints => json!({
            "Environment": environment(settings),
            "Options": {
                "NumPoints": "2",
                "OccurrencesFilter": {"EnvironmentallyUnique": {}}
            }
        }),
        JobKind::Experiment => experiment_params(settings),
    };

    if let (true, Some(model)) = (kind.needs_model(), model) {
        params["Algorithm"] = model.clone();
    }
    params
}

/// Five chained jobs sharing one environment, presence set and algorithm
fn experiment_params(settings: &CheckSettings) -> Value {
    let mut env = environment(settings);
    env["id"] = json!("environment1");
    let mut presence = presence(&settings.points);
    presence["id"] = json!("presence1");

    json!({
        "Environment": env,
        "Presence": presence,
        "AlgorithmSettings": {
            "id": "algorithm1",
            "Algorithm": {
                "Id": "ENVDIST",
                "Version": "0.5",
                "Parameters": {
                    "Parameter": [
                        {"Id": "DistanceType", "Value": "1"},
                        {"Id": "NearestPoints", "Value": "0"},
                        {"Id": "MaxDistance", "Value": "0.1"}
                    ]
                }
            }
        },
        "Jobs": [
            {
                "Type": "SamplingJob",
                "id": "job1",
                "EnvironmentRef": {"idref": "environment1"},
                "Options": {
                    "NumPoints": "100",
                    "Label": "Background",
                    "ProportionOfAbsences": "1.0",
                    "OccurrencesFilter": {"EnvironmentallyUnique": {}}
                }
            },
            {
                "Type": "CreateModelJob",
                "id": "job2",
                "EnvironmentRef": {"idref": "environment1"},
                "PresenceRef": {"idref": "presence1"},
                "AlgorithmRef": {"idref": "algorithm1"}
            },
            {
                "Type": "TestModelJob",
                "id": "job3",
                "EnvironmentRef": {"idref": "environment1"},
                "PresenceRef": {"idref": "presence1"},
                "AbsenceRef": {"idref": "job1"},
                "ModelRef": {"idref": "job2"},
                "Statistics": {
                    "ConfusionMatrix": {"Threshold": "lpt", "IgnoreAbsences": "1"},
                    "RocCurve": {
                        "BackgroundPoints": "100",
                        "Resolution": "10",
                        "MaxOmission": "1.0",
                        "UseAbsencesAsBackground": "1"
                    }
                }
            },
            {
                "Type": "ProjectModelJob",
                "id": "job4",
                "EnvironmentRef": {"idref": "environment1"},
                "ModelRef": {"idref": "job2"},
                "OutputParameters": {
                    "FileType": "ByteHFA",
                    "TemplateLayer": {"Id": settings.layers[0]}
                }
            },
            {
                "Type": "EvaluateModelJob",
                "id": "job5",
                "EnvironmentRef": {"idref": "environment1"},
                "PresenceRef": {"idref": "presence1"},
                "ModelRef": {"idref": "job2"}
            }
        ]
    })
}
