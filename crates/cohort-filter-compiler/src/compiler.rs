//! Filter compiler implementation.

use cohort_filter::{FilterError, FilterNode, Group, Join, Polarity, Selector, Tvs};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileResult};
use crate::leaf::{
    categorical, condition, gene_variant, multivalue, numeric, quantitative, samplelst, snp,
    survival, GENOTYPE_PROVIDER, MUTATION_CLASSIFIER, QUANTITATIVE_PROVIDER,
};
use crate::plan::{
    child_name, raw_name, superset_name, CompiledPlan, CompiledSubquery, SetOp, SubqueryBody,
    Table,
};
use crate::sample_type::{leaf_sample_type, SampleTypeContext};
use crate::traits::{GenotypeProvider, MutationClassifier, QuantitativeValueProvider, TermRegistry};
use crate::validator;

/// Compiles client filters into [`CompiledPlan`]s.
///
/// The compiler holds read-only references to its collaborators and no
/// mutable state, so one instance can compile any number of filters, and
/// compiling the same filter twice yields identical plans.
///
/// # Example
///
/// ```ignore
/// use cohort_filter_compiler::{CompilerConfig, FilterCompiler};
///
/// let compiler = FilterCompiler::new(&registry)
///     .with_mutation_classifier(&classifier)
///     .with_genotype_provider(&genotypes);
///
/// let plan = compiler.compile(&filter_json).await?;
/// let rows = db.query(&plan.to_sql(), &plan.values())?;
/// ```
pub struct FilterCompiler<'a> {
    /// Term definitions and sample-type schema.
    registry: &'a dyn TermRegistry,
    /// Provider for gene-variant leaves.
    classifier: Option<&'a dyn MutationClassifier>,
    /// Provider for expression and metabolite leaves.
    quantitative: Option<&'a dyn QuantitativeValueProvider>,
    /// Provider for snp leaves.
    genotypes: Option<&'a dyn GenotypeProvider>,
    /// Compiler configuration.
    config: CompilerConfig,
}

impl<'a> FilterCompiler<'a> {
    /// Creates a compiler with default configuration and no data providers.
    ///
    /// Filters with provider-backed leaves fail with
    /// [`CompileError::ProviderNotConfigured`] until the matching provider is set.
    pub fn new(registry: &'a dyn TermRegistry) -> Self {
        Self::with_config(registry, CompilerConfig::default())
    }

    /// Creates a compiler with custom configuration.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = CompilerConfig::builder()
    ///     .with_parallel_providers(true)
    ///     .build();
    ///
    /// let compiler = FilterCompiler::with_config(&registry, config);
    /// ```
    pub fn with_config(registry: &'a dyn TermRegistry, config: CompilerConfig) -> Self {
        Self {
            registry,
            classifier: None,
            quantitative: None,
            genotypes: None,
            config,
        }
    }

    /// Sets the mutation classifier used by gene-variant leaves.
    pub fn with_mutation_classifier(mut self, classifier: &'a dyn MutationClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Sets the value provider used by expression and metabolite leaves.
    pub fn with_quantitative_provider(mut self, provider: &'a dyn QuantitativeValueProvider) -> Self {
        self.quantitative = Some(provider);
        self
    }

    /// Sets the genotype provider used by snp leaves.
    pub fn with_genotype_provider(mut self, provider: &'a dyn GenotypeProvider) -> Self {
        self.genotypes = Some(provider);
        self
    }

    /// Returns a reference to the compiler configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Validates, hydrates and compiles a client filter.
    ///
    /// # Returns
    ///
    /// * `Ok(CompiledPlan)` - Subqueries in dependency order with their parameters
    /// * `Err(CompileError)` - The first shape, term, leaf or provider error;
    ///   no partial plan is returned
    pub async fn compile(&self, filter: &Value) -> CompileResult<CompiledPlan> {
        let tree = self.validate(filter)?;
        self.compile_tree(&tree).await
    }

    /// Validates and hydrates a client filter without compiling it.
    pub fn validate(&self, filter: &Value) -> CompileResult<FilterNode<Tvs>> {
        validator::validate(filter, self.registry)
    }

    /// Compiles an already hydrated filter tree.
    ///
    /// An empty root group compiles to a plan selecting every sample. Trees
    /// built in code are held to the same shape rules as parsed filters:
    /// empty nested groups, an empty group as the second of two children and
    /// multi-child groups without a join are rejected.
    pub async fn compile_tree(&self, tree: &FilterNode<Tvs>) -> CompileResult<CompiledPlan> {
        let context = SampleTypeContext::collect(tree, self.registry, &self.config.cohort_term_id);
        let root = self.config.root_name.clone();
        debug!(
            root = %root,
            leaves = tree.leaf_count(),
            sample_types = context.types.len(),
            parallel = self.config.parallel_providers,
            "compiling filter"
        );

        let subqueries = match tree {
            FilterNode::Group(group) if group.is_empty() => {
                vec![CompiledSubquery::new(root.clone(), SubqueryBody::Universe)]
            }
            node => self.compile_node(node, root.clone(), &context).await?,
        };

        let plan = CompiledPlan { root, subqueries };
        debug!(
            root = %plan.root,
            subqueries = plan.subqueries.len(),
            parameters = plan.values().len(),
            "compiled filter"
        );
        Ok(plan)
    }

    // =========================================================================
    // Tree recursion
    // =========================================================================

    fn compile_node<'b>(
        &'b self,
        node: &'b FilterNode<Tvs>,
        name: String,
        context: &'b SampleTypeContext,
    ) -> BoxFuture<'b, CompileResult<Vec<CompiledSubquery>>> {
        async move {
            match node {
                FilterNode::Leaf(tvs) => self.compile_leaf(tvs, name, context).await,
                FilterNode::Group(group) => self.compile_group(group, name, context).await,
            }
        }
        .boxed()
    }

    async fn compile_group(
        &self,
        group: &Group<Tvs>,
        name: String,
        context: &SampleTypeContext,
    ) -> CompileResult<Vec<CompiledSubquery>> {
        // Trees built in code get the same shape checks as parsed filters.
        if group.is_empty() {
            return Err(FilterError::EmptyNestedGroup { path: name }.into());
        }
        if group.children.len() == 2 && is_empty_group(&group.children[1]) {
            return Err(FilterError::DenormalizedEmptyGroup { path: name }.into());
        }
        if group.children.len() > 1 && group.join.is_none() {
            return Err(FilterError::MissingJoin {
                path: name,
                len: group.children.len(),
            }
            .into());
        }

        let children: Vec<(String, &FilterNode<Tvs>)> = group
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| (child_name(&name, i), child))
            .collect();
        let inputs: Vec<String> = children.iter().map(|(n, _)| n.clone()).collect();

        let compiled = if self.config.parallel_providers {
            try_join_all(
                children
                    .into_iter()
                    .map(|(label, child)| self.compile_node(child, label, context)),
            )
            .await?
        } else {
            let mut compiled = Vec::with_capacity(children.len());
            for (label, child) in children {
                compiled.push(self.compile_node(child, label, context).await?);
            }
            compiled
        };
        let mut subqueries: Vec<CompiledSubquery> = compiled.into_iter().flatten().collect();

        let superset = superset_name(&name);
        let superset_body = match inputs.len() {
            1 => SubqueryBody::Combine { op: None, inputs },
            _ => SubqueryBody::Combine {
                op: Some(match group.join {
                    Some(Join::Or) => SetOp::Union,
                    _ => SetOp::Intersect,
                }),
                inputs,
            },
        };
        let body = match group.polarity {
            Polarity::Match => SubqueryBody::Matched {
                of: superset.clone(),
            },
            Polarity::Complement => SubqueryBody::Complement {
                of: superset.clone(),
            },
        };

        trace!(group = %name, polarity = ?group.polarity, "compiled group");
        subqueries.push(CompiledSubquery::new(superset, superset_body));
        subqueries.push(CompiledSubquery::new(name, body));
        Ok(subqueries)
    }

    async fn compile_leaf(
        &self,
        tvs: &Tvs,
        name: String,
        context: &SampleTypeContext,
    ) -> CompileResult<Vec<CompiledSubquery>> {
        let sample_type = leaf_sample_type(tvs, self.registry);
        if !context.expand_to_children(sample_type.as_deref()) {
            return Ok(vec![self.compile_selector(tvs, &name, context).await?]);
        }

        let raw = raw_name(&name);
        let matched = self.compile_selector(tvs, &raw, context).await?;
        trace!(leaf = %name, sample_type = ?sample_type, "expanding leaf to descendant samples");
        Ok(vec![
            matched,
            CompiledSubquery::new(name, SubqueryBody::Expand { of: raw }),
        ])
    }

    async fn compile_selector(
        &self,
        tvs: &Tvs,
        name: &str,
        context: &SampleTypeContext,
    ) -> CompileResult<CompiledSubquery> {
        let timeout = self.config.provider_timeout;
        let subquery = match &tvs.selector {
            Selector::Categorical(selector) => categorical::compile(name, tvs, selector),
            Selector::Integer(selector) => {
                numeric::compile(name, tvs, selector, Table::AnnoInteger)?
            }
            Selector::Float(selector) => numeric::compile(name, tvs, selector, Table::AnnoFloat)?,
            Selector::Condition(selector) => condition::compile(name, tvs, selector)?,
            Selector::Survival(selector) => survival::compile(name, tvs, selector)?,
            Selector::SampleList(selector) => samplelst::compile(
                name,
                tvs,
                selector,
                self.registry.distinguishes_sample_types(),
            ),
            Selector::Multivalue(selector) => multivalue::compile(name, tvs, selector)?,
            Selector::GeneVariant(selector) => {
                let classifier = self
                    .classifier
                    .ok_or_else(|| not_configured(MUTATION_CLASSIFIER, tvs))?;
                gene_variant::compile(name, tvs, selector, classifier, context, timeout).await?
            }
            Selector::Snp(selector) => {
                let provider = self
                    .genotypes
                    .ok_or_else(|| not_configured(GENOTYPE_PROVIDER, tvs))?;
                snp::compile(name, tvs, selector, provider, timeout).await?
            }
            Selector::GeneExpression(selector) | Selector::MetaboliteIntensity(selector) => {
                let provider = self
                    .quantitative
                    .ok_or_else(|| not_configured(QUANTITATIVE_PROVIDER, tvs))?;
                quantitative::compile(name, tvs, selector, provider, timeout).await?
            }
        };
        trace!(leaf = %name, term = %tvs.term.id, parameters = subquery.values.len(), "compiled leaf");
        Ok(subquery)
    }
}

fn not_configured(provider: &'static str, tvs: &Tvs) -> CompileError {
    CompileError::ProviderNotConfigured {
        provider,
        term_id: tvs.term.id.clone(),
    }
}

fn is_empty_group(node: &FilterNode<Tvs>) -> bool {
    matches!(node, FilterNode::Group(group) if group.is_empty())
}
