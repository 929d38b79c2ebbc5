//! Session refresh wrapper
//!
//! An adapter holding a long-lived session can miss writes made by other
//! processes sharing the table (several workers behind one proxy, for
//! example). [`RefreshingAdapter`] refreshes the inner adapter before
//! every delegated call.

use async_trait::async_trait;

use crate::{
    adapter::{Adapter, PolicyAdapter},
    error::AdapterResult,
    model::Model,
    models::PolicyFilter,
};

/// Adapters that can drop stale session state
#[async_trait]
pub trait Refresh {
    async fn refresh(&mut self) -> AdapterResult<()>;
}

#[async_trait]
impl Refresh for Adapter {
    async fn refresh(&mut self) -> AdapterResult<()> {
        Adapter::refresh(self).await
    }
}

/// Refresh-then-delegate wrapper around any adapter
pub struct RefreshingAdapter<A> {
    inner: A,
}

impl<A> RefreshingAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

#[async_trait]
impl<A> PolicyAdapter for RefreshingAdapter<A>
where
    A: PolicyAdapter + Refresh + Send,
{
    async fn load_policy(&mut self, model: &mut dyn Model) -> AdapterResult<()> {
        self.inner.refresh().await?;
        self.inner.load_policy(model).await
    }

    async fn load_filtered_policy(
        &mut self,
        model: &mut dyn Model,
        filter: &PolicyFilter,
    ) -> AdapterResult<()> {
        self.inner.refresh().await?;
        self.inner.load_filtered_policy(model, filter).await
    }

    fn is_filtered(&self) -> bool {
        self.inner.is_filtered()
    }

    async fn save_policy(&mut self, model: &dyn Model) -> AdapterResult<bool> {
        self.inner.refresh().await?;
        self.inner.save_policy(model).await
    }

    async fn add_policy(&mut self, sec: &str, ptype: &str, rule: &[String]) -> AdapterResult<bool> {
        self.inner.refresh().await?;
        self.inner.add_policy(sec, ptype, rule).await
    }

    async fn add_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> AdapterResult<bool> {
        self.inner.refresh().await?;
        self.inner.add_policies(sec, ptype, rules).await
    }

    async fn remove_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> AdapterResult<bool> {
        self.inner.refresh().await?;
        self.inner.remove_policy(sec, ptype, rule).await
    }

    async fn remove_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> AdapterResult<bool> {
        self.inner.refresh().await?;
        self.inner.remove_policies(sec, ptype, rules).await
    }

    async fn remove_filtered_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> AdapterResult<bool> {
        self.inner.refresh().await?;
        self.inner
            .remove_filtered_policy(sec, ptype, field_index, field_values)
            .await
    }

    async fn update_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        old_rule: &[String],
        new_rule: &[String],
    ) -> AdapterResult<bool> {
        self.inner.refresh().await?;
        self.inner.update_policy(sec, ptype, old_rule, new_rule).await
    }

    async fn update_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        old_rules: &[Vec<String>],
        new_rules: &[Vec<String>],
    ) -> AdapterResult<bool> {
        self.inner.refresh().await?;
        self.inner
            .update_policies(sec, ptype, old_rules, new_rules)
            .await
    }

    async fn update_filtered_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        new_rules: &[Vec<String>],
        field_index: usize,
        field_values: &[String],
    ) -> AdapterResult<Vec<Vec<String>>> {
        self.inner.refresh().await?;
        self.inner
            .update_filtered_policies(sec, ptype, new_rules, field_index, field_values)
            .await
    }
}
