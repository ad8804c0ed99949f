//! Integration tests for filter compilation with mock collaborators.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cohort_filter::{DataType, FilterError, SampleId, Term, TermType, TermValue};
use cohort_filter_compiler::{
    ClassifiedVariant, CompileError, CompilerConfig, FilterCompiler, GenotypeCall,
    GenotypeProvider, MutationClassifier, ProviderError, QuantitativeValueProvider,
    SampleTypeContext, SubqueryBody, TermRegistry, Value,
};
use serde_json::{json, Value as Json};

// =============================================================================
// Mock collaborators
// =============================================================================

/// Term registry with a two-level patient/tumor schema.
struct MockRegistry {
    terms: HashMap<String, (Term, Option<&'static str>)>,
    parent: Option<String>,
}

impl MockRegistry {
    fn new() -> Self {
        let mut registry = Self {
            terms: HashMap::new(),
            parent: Some("patient".to_string()),
        };
        registry.add(Term::new("sex", TermType::Categorical), Some("patient"));
        registry.add(Term::new("diagnosis", TermType::Categorical), Some("patient"));
        registry.add(
            Term::new("agedx", TermType::Float).with_value(
                "-9999",
                TermValue {
                    uncomputable: true,
                    ..Default::default()
                },
            ),
            Some("patient"),
        );
        registry.add(Term::new("tumor_site", TermType::Categorical), Some("tumor"));
        registry.add(Term::new("TP53", TermType::GeneVariant).with_gene("TP53"), Some("tumor"));
        registry.add(Term::new("rs1", TermType::Snp), Some("patient"));
        registry.add(Term::new("rs2", TermType::Snp), Some("patient"));
        registry.add(Term::new("rs3", TermType::Snp), Some("patient"));
        registry.add(
            Term::new("KRAS_expr", TermType::GeneExpression).with_gene("KRAS"),
            Some("tumor"),
        );
        registry.add(Term::new("subcohort", TermType::Categorical), Some("tumor"));
        registry
    }

    fn flat() -> Self {
        let mut registry = Self::new();
        registry.parent = None;
        for entry in registry.terms.values_mut() {
            entry.1 = None;
        }
        registry
    }

    fn add(&mut self, term: Term, sample_type: Option<&'static str>) {
        self.terms.insert(term.id.clone(), (term, sample_type));
    }
}

impl TermRegistry for MockRegistry {
    fn resolve(&self, term_id: &str) -> Option<Term> {
        self.terms.get(term_id).map(|(term, _)| term.clone())
    }

    fn sample_type_of(&self, term_id: &str) -> Option<String> {
        self.terms
            .get(term_id)
            .and_then(|(_, sample_type)| sample_type.map(str::to_string))
    }

    fn parent_sample_type(&self) -> Option<String> {
        self.parent.clone()
    }
}

/// Genotype provider that records call order and can delay or fail per term.
#[derive(Default)]
struct MockGenotypes {
    calls: Mutex<Vec<String>>,
    delays: HashMap<String, Duration>,
    failing: Option<String>,
}

#[async_trait]
impl GenotypeProvider for MockGenotypes {
    async fn genotypes(&self, term: &Term) -> Result<Vec<GenotypeCall>, ProviderError> {
        if let Some(delay) = self.delays.get(&term.id) {
            tokio::time::sleep(*delay).await;
        }
        self.calls.lock().unwrap().push(term.id.clone());
        if self.failing.as_deref() == Some(term.id.as_str()) {
            return Err(ProviderError::new("genotype store unavailable"));
        }
        Ok(vec![
            GenotypeCall::new(1, "A/A"),
            GenotypeCall::new(2, "A/G"),
            GenotypeCall::new(3, "G/G"),
        ])
    }
}

struct MockClassifier;

#[async_trait]
impl MutationClassifier for MockClassifier {
    async fn classify(
        &self,
        _term: &Term,
        _context: &SampleTypeContext,
    ) -> Result<BTreeMap<SampleId, Vec<ClassifiedVariant>>, ProviderError> {
        let mut result = BTreeMap::new();
        result.insert(1, vec![ClassifiedVariant::new(DataType::SNV_INDEL, "M")]);
        result.insert(2, vec![ClassifiedVariant::new(DataType::SNV_INDEL, "WT")]);
        Ok(result)
    }
}

struct MockExpression;

#[async_trait]
impl QuantitativeValueProvider for MockExpression {
    async fn values(&self, feature_key: &str) -> Result<BTreeMap<SampleId, f64>, ProviderError> {
        assert_eq!(feature_key, "KRAS");
        Ok([(4, 0.5), (5, 7.5), (6, 20.0)].into_iter().collect())
    }
}

// =============================================================================
// Filter builders
// =============================================================================

fn group(join: &str, lst: Vec<Json>) -> Json {
    json!({ "type": "tvslst", "join": join, "in": true, "lst": lst })
}

fn complement(join: &str, lst: Vec<Json>) -> Json {
    json!({ "type": "tvslst", "join": join, "in": false, "lst": lst })
}

fn categorical(id: &str, keys: &[&str]) -> Json {
    let values: Vec<Json> = keys.iter().map(|k| json!({ "key": k })).collect();
    json!({ "type": "tvs", "tvs": { "term": { "id": id }, "values": values } })
}

fn snp(id: &str, genotype: &str) -> Json {
    json!({ "type": "tvs", "tvs": { "term": { "id": id }, "values": [{ "key": genotype }] } })
}

fn subquery_names(plan: &cohort_filter_compiler::CompiledPlan) -> Vec<&str> {
    plan.subqueries.iter().map(|s| s.name.as_str()).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_compile_is_pure() {
    let registry = MockRegistry::flat();
    let genotypes = MockGenotypes::default();
    let compiler = FilterCompiler::new(&registry).with_genotype_provider(&genotypes);
    let filter = group(
        "or",
        vec![
            categorical("sex", &["F"]),
            complement("and", vec![categorical("diagnosis", &["A"]), snp("rs1", "A/G")]),
        ],
    );

    let first = compiler.compile(&filter).await.unwrap();
    let second = compiler.compile(&filter).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.to_sql(), second.to_sql());
}

#[tokio::test]
async fn test_parameters_concatenate_in_child_order() {
    let registry = MockRegistry::flat();
    let compiler = FilterCompiler::new(&registry);
    let plan = compiler
        .compile(&group(
            "and",
            vec![
                categorical("sex", &["F"]),
                json!({ "type": "tvs", "tvs": {
                    "term": { "id": "agedx" },
                    "ranges": [{ "start": 10, "stop": 20, "startinclusive": true }]
                }}),
                categorical("diagnosis", &["A", "B"]),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(
        plan.values(),
        vec![
            Value::text("sex"),
            Value::text("F"),
            Value::text("agedx"),
            Value::Float(10.0),
            Value::Float(20.0),
            Value::Float(-9999.0),
            Value::text("diagnosis"),
            Value::text("A"),
            Value::text("B"),
        ]
    );
    assert_eq!(plan.to_sql().matches('?').count(), plan.values().len());
}

#[tokio::test]
async fn test_single_child_group_ignores_join() {
    let registry = MockRegistry::flat();
    let compiler = FilterCompiler::new(&registry);
    let plan = compiler
        .compile(&json!({ "type": "tvslst", "join": "bogus-but-ignored", "lst": [categorical("sex", &["M"])] }))
        .await
        .unwrap();

    assert_eq!(
        plan.get("f_superset").map(|s| &s.body),
        Some(&SubqueryBody::Combine {
            op: None,
            inputs: vec!["f_0".to_string()],
        })
    );
}

#[tokio::test]
async fn test_shape_errors_abort() {
    let registry = MockRegistry::flat();
    let compiler = FilterCompiler::new(&registry);

    let missing_join = compiler
        .compile(&json!({ "type": "tvslst", "lst": [categorical("sex", &["M"]), categorical("sex", &["F"])] }))
        .await
        .unwrap_err();
    assert!(matches!(missing_join, CompileError::Shape(FilterError::MissingJoin { .. })));

    let nested_empty = compiler
        .compile(&group(
            "and",
            vec![categorical("sex", &["M"]), categorical("sex", &["F"]), group("and", vec![])],
        ))
        .await
        .unwrap_err();
    assert!(matches!(nested_empty, CompileError::Shape(FilterError::EmptyNestedGroup { .. })));

    let denormalized = compiler
        .compile(&group("and", vec![categorical("sex", &["M"]), group("or", vec![])]))
        .await
        .unwrap_err();
    assert!(matches!(
        denormalized,
        CompileError::Shape(FilterError::DenormalizedEmptyGroup { .. })
    ));
}

#[tokio::test]
async fn test_condition_leaf_validation() {
    let registry = MockRegistry::flat();
    let compiler = FilterCompiler::new(&registry);
    let condition = |flags: Json| {
        let mut tvs = json!({
            "term": { "id": "Arrhythmias", "type": "condition" },
            "values": [{ "key": 3 }]
        });
        for (k, v) in flags.as_object().unwrap() {
            tvs[k] = v.clone();
        }
        json!({ "type": "tvslst", "lst": [{ "type": "tvs", "tvs": tvs }] })
    };

    let ok = compiler
        .compile(&condition(json!({ "bar_by_children": true, "value_by_computable_grade": true })))
        .await
        .unwrap();
    assert!(ok.to_sql().contains("precomputed_chc_child"));
    assert!(ok.to_sql().contains("computable_grade = 1"));

    for bad in [
        json!({ "value_by_max_grade": true }),
        json!({ "bar_by_grade": true }),
        json!({ "bar_by_grade": true, "bar_by_children": true, "value_by_max_grade": true }),
        json!({ "bar_by_grade": true, "value_by_max_grade": true, "value_by_most_recent": true }),
    ] {
        let err = compiler.compile(&condition(bad)).await.unwrap_err();
        assert!(matches!(err, CompileError::LeafStructure { .. }), "got {:?}", err);
    }
}

#[tokio::test]
async fn test_unknown_term_errors() {
    let registry = MockRegistry::flat();
    let compiler = FilterCompiler::new(&registry);

    let err = compiler
        .compile(&group("and", vec![categorical("sex", &["M"]), categorical("ghost", &["x"])]))
        .await
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidTermId(id) if id == "ghost"));

    let err = compiler
        .compile(&json!({ "type": "tvslst", "lst": [
            { "type": "tvs", "tvs": { "term": { "id": "x", "type": "dtblob" } } }
        ]}))
        .await
        .unwrap_err();
    assert!(matches!(err, CompileError::UnknownTermType { .. }));
}

#[tokio::test]
async fn test_provider_calls_are_sequential_preorder() {
    let registry = MockRegistry::flat();
    let mut genotypes = MockGenotypes::default();
    // The first leaf is the slowest; sequential compilation still calls it first.
    genotypes.delays.insert("rs1".to_string(), Duration::from_millis(30));
    let compiler = FilterCompiler::new(&registry).with_genotype_provider(&genotypes);

    compiler
        .compile(&group(
            "or",
            vec![
                snp("rs1", "A/G"),
                group("and", vec![snp("rs2", "A/A"), snp("rs3", "G/G")]),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(*genotypes.calls.lock().unwrap(), vec!["rs1", "rs2", "rs3"]);
}

#[tokio::test]
async fn test_parallel_compilation_matches_sequential() {
    let registry = MockRegistry::flat();
    let mut genotypes = MockGenotypes::default();
    genotypes.delays.insert("rs1".to_string(), Duration::from_millis(30));
    genotypes.delays.insert("rs2".to_string(), Duration::from_millis(10));
    let filter = group(
        "or",
        vec![
            snp("rs1", "A/G"),
            categorical("sex", &["F"]),
            complement("and", vec![snp("rs2", "A/A"), snp("rs3", "G/G")]),
        ],
    );

    let sequential = FilterCompiler::new(&registry)
        .with_genotype_provider(&genotypes)
        .compile(&filter)
        .await
        .unwrap();

    genotypes.calls.lock().unwrap().clear();
    let parallel_config = CompilerConfig::builder().with_parallel_providers(true).build();
    let parallel = FilterCompiler::with_config(&registry, parallel_config)
        .with_genotype_provider(&genotypes)
        .compile(&filter)
        .await
        .unwrap();

    assert_eq!(sequential, parallel);
    // The slow first leaf finished last, so the calls really overlapped.
    assert_eq!(genotypes.calls.lock().unwrap().last().map(String::as_str), Some("rs1"));
}

#[tokio::test]
async fn test_provider_failure_aborts_compilation() {
    let registry = MockRegistry::flat();
    let genotypes = MockGenotypes {
        failing: Some("rs2".to_string()),
        ..Default::default()
    };
    let compiler = FilterCompiler::new(&registry).with_genotype_provider(&genotypes);

    let err = compiler
        .compile(&group("and", vec![snp("rs1", "A/G"), snp("rs2", "A/G"), snp("rs3", "A/G")]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CompileError::Provider { ref term_id, .. } if term_id == "rs2"
    ));
    assert_eq!(*genotypes.calls.lock().unwrap(), vec!["rs1", "rs2"]);
}

#[tokio::test]
async fn test_provider_timeout_aborts_compilation() {
    let registry = MockRegistry::flat();
    let mut genotypes = MockGenotypes::default();
    genotypes.delays.insert("rs1".to_string(), Duration::from_secs(10));
    let config = CompilerConfig::builder()
        .with_provider_timeout(Duration::from_millis(20))
        .build();
    let compiler = FilterCompiler::with_config(&registry, config).with_genotype_provider(&genotypes);

    let err = compiler
        .compile(&json!({ "type": "tvslst", "lst": [snp("rs1", "A/G")] }))
        .await
        .unwrap_err();

    match err {
        CompileError::Provider { source, .. } => {
            assert_eq!(source, ProviderError::timed_out(Duration::from_millis(20)));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_provider_leaves_inline_sample_ids() {
    let registry = MockRegistry::flat();
    let classifier = MockClassifier;
    let expression = MockExpression;
    let compiler = FilterCompiler::new(&registry)
        .with_mutation_classifier(&classifier)
        .with_quantitative_provider(&expression);

    let plan = compiler
        .compile(&group(
            "or",
            vec![
                json!({ "type": "tvs", "tvs": {
                    "term": { "id": "TP53" },
                    "values": [{ "dt": 1, "mclassLst": ["M"], "mclassExcludeLst": ["WT"] }]
                }}),
                json!({ "type": "tvs", "tvs": {
                    "term": { "id": "KRAS_expr" },
                    "ranges": [{ "start": 5, "stop": 10, "startinclusive": true }]
                }}),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(plan.get("f_0").unwrap().values, vec![Value::Integer(1)]);
    assert_eq!(plan.get("f_1").unwrap().values, vec![Value::Integer(5)]);
}

#[tokio::test]
async fn test_mixed_sample_types_expand_parent_leaves() {
    let registry = MockRegistry::new();
    let compiler = FilterCompiler::new(&registry);

    let plan = compiler
        .compile(&group(
            "and",
            vec![categorical("sex", &["F"]), categorical("tumor_site", &["brain"])],
        ))
        .await
        .unwrap();

    assert_eq!(
        subquery_names(&plan),
        vec!["f_0_raw", "f_0", "f_1", "f_superset", "f"]
    );
    assert_eq!(
        plan.get("f_0").map(|s| &s.body),
        Some(&SubqueryBody::Expand {
            of: "f_0_raw".to_string()
        })
    );
}

#[tokio::test]
async fn test_single_sample_type_does_not_expand() {
    let registry = MockRegistry::new();
    let compiler = FilterCompiler::new(&registry);

    // The cohort term is tumor-level but does not count as a referenced type.
    let plan = compiler
        .compile(&group(
            "and",
            vec![categorical("subcohort", &["SJLIFE"]), categorical("sex", &["F"])],
        ))
        .await
        .unwrap();

    assert_eq!(subquery_names(&plan), vec!["f_0", "f_1", "f_superset", "f"]);
}
