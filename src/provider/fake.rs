//! In-memory cloud used by the reconciler tests.
//!
//! Every call is recorded as `"<operation> <name>"`, split into reads and
//! mutations, and any operation can be made to fail once.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::credentials::Credentials;
use crate::error::ProviderError;

use super::api::{CloudApi, ComputeApi, Connector, Lookup, ProviderResult, StorageApi};
use super::types::{
    Address, Bucket, CreateImageRequest, CreateVolumeRequest, Firewall, ForwardingRule,
    HttpHealthCheck, Image, Network, Route, TargetPool, Volume,
};

/// Everything the fake knows about.
#[derive(Debug, Default)]
pub struct FakeState {
    pub volumes: BTreeMap<String, Volume>,
    pub snapshots: BTreeSet<String>,
    pub networks: BTreeMap<String, Network>,
    pub firewalls: BTreeMap<String, Firewall>,
    pub images: BTreeMap<String, Image>,
    pub addresses: BTreeMap<String, Address>,
    pub forwarding_rules: BTreeMap<String, ForwardingRule>,
    pub health_checks: BTreeMap<String, HttpHealthCheck>,
    pub target_pools: BTreeMap<String, TargetPool>,
    pub routes: BTreeMap<String, Route>,
    pub buckets: BTreeMap<String, Bucket>,
    pub reads: Vec<String>,
    pub mutations: Vec<String>,
    failures: HashMap<String, ProviderError>,
}

impl FakeState {
    fn read(&mut self, op: &str, name: &str) -> ProviderResult<()> {
        self.reads.push(format!("{op} {name}"));
        self.failures.remove(op).map_or(Ok(()), Err)
    }

    fn mutate(&mut self, op: &str, name: &str) -> ProviderResult<()> {
        self.mutations.push(format!("{op} {name}"));
        self.failures.remove(op).map_or(Ok(()), Err)
    }
}

fn not_found(name: &str) -> ProviderError {
    ProviderError::NotFound {
        resource: name.to_string(),
    }
}

fn fetch<T: Clone>(map: &BTreeMap<String, T>, name: &str) -> ProviderResult<T> {
    map.get(name).cloned().ok_or_else(|| not_found(name))
}

fn insert_new<T: Clone>(map: &mut BTreeMap<String, T>, name: &str, value: T) -> ProviderResult<T> {
    if map.contains_key(name) {
        return Err(ProviderError::AlreadyExists {
            resource: name.to_string(),
        });
    }
    map.insert(name.to_string(), value.clone());
    Ok(value)
}

fn remove<T>(map: &mut BTreeMap<String, T>, name: &str) -> ProviderResult<()> {
    map.remove(name).map(|_| ()).ok_or_else(|| not_found(name))
}

fn image_link(project: &str, name: &str) -> String {
    format!("https://www.googleapis.com/compute/v1/projects/{project}/global/images/{name}")
}

/// An in-memory [`CloudApi`].
#[derive(Debug, Default)]
pub struct FakeCloud {
    state: Mutex<FakeState>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake cloud lock poisoned")
    }

    /// Makes the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: &str, err: ProviderError) {
        self.lock().failures.insert(op.to_string(), err);
    }

    pub fn mutations(&self) -> Vec<String> {
        self.lock().mutations.clone()
    }

    pub fn reads(&self) -> Vec<String> {
        self.lock().reads.clone()
    }

    pub fn clear_calls(&self) {
        let mut state = self.lock();
        state.reads.clear();
        state.mutations.clear();
    }

    pub fn add_image(&self, name: &str, family: Option<&str>) {
        self.lock().images.insert(
            name.to_string(),
            Image {
                name: name.to_string(),
                self_link: image_link("test-project", name),
                family: family.map(String::from),
                description: None,
            },
        );
    }
}

#[async_trait]
impl ComputeApi for FakeCloud {
    async fn get_volume(&self, name: &str, _zone: &str) -> ProviderResult<Lookup<Volume>> {
        let mut s = self.lock();
        let result = s.read("get_volume", name).and_then(|()| fetch(&s.volumes, name));
        Lookup::from_result(result)
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> ProviderResult<Volume> {
        let mut s = self.lock();
        s.mutate("create_volume", &request.name)?;
        if let Some(snapshot) = &request.snapshot {
            if !s.snapshots.contains(snapshot) {
                return Err(not_found(snapshot));
            }
        }
        let volume = Volume {
            name: request.name.clone(),
            zone: request.zone.clone(),
            size_gb: request.size_gb.unwrap_or(10),
            disk_type: request.disk_type.clone(),
        };
        insert_new(&mut s.volumes, &request.name, volume)
    }

    async fn destroy_volume(&self, name: &str, _zone: &str) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("destroy_volume", name)?;
        remove(&mut s.volumes, name)
    }

    async fn get_network(&self, name: &str) -> ProviderResult<Lookup<Network>> {
        let mut s = self.lock();
        let result = s.read("get_network", name).and_then(|()| fetch(&s.networks, name));
        Lookup::from_result(result)
    }

    async fn create_network(
        &self,
        name: &str,
        address_range: Option<&str>,
    ) -> ProviderResult<Network> {
        let mut s = self.lock();
        s.mutate("create_network", name)?;
        let network = Network {
            name: name.to_string(),
            address_range: address_range.map(String::from),
        };
        insert_new(&mut s.networks, name, network)
    }

    async fn destroy_network(&self, name: &str) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("destroy_network", name)?;
        remove(&mut s.networks, name)
    }

    async fn list_firewalls(&self) -> ProviderResult<Vec<Firewall>> {
        let mut s = self.lock();
        s.read("list_firewalls", "*")?;
        Ok(s.firewalls.values().cloned().collect())
    }

    async fn create_firewall(&self, firewall: &Firewall) -> ProviderResult<Firewall> {
        let mut s = self.lock();
        s.mutate("create_firewall", &firewall.name)?;
        insert_new(&mut s.firewalls, &firewall.name, firewall.clone())
    }

    async fn update_firewall(&self, firewall: &Firewall) -> ProviderResult<Firewall> {
        let mut s = self.lock();
        s.mutate("update_firewall", &firewall.name)?;
        let slot = s
            .firewalls
            .get_mut(&firewall.name)
            .ok_or_else(|| not_found(&firewall.name))?;
        *slot = firewall.clone();
        Ok(firewall.clone())
    }

    async fn destroy_firewall(&self, name: &str) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("destroy_firewall", name)?;
        remove(&mut s.firewalls, name)
    }

    async fn get_image(&self, name: &str, _project: Option<&str>) -> ProviderResult<Lookup<Image>> {
        let mut s = self.lock();
        let short = name.rsplit('/').next().unwrap_or(name);
        let result = s.read("get_image", name).and_then(|()| fetch(&s.images, short));
        Lookup::from_result(result)
    }

    async fn get_image_from_family(
        &self,
        family: &str,
        _project: Option<&str>,
    ) -> ProviderResult<Lookup<Image>> {
        let mut s = self.lock();
        let result = s.read("get_image_from_family", family).and_then(|()| {
            s.images
                .values()
                .filter(|i| i.family.as_deref() == Some(family))
                .max_by(|a, b| a.name.cmp(&b.name))
                .cloned()
                .ok_or_else(|| not_found(family))
        });
        Lookup::from_result(result)
    }

    async fn create_image(&self, request: &CreateImageRequest) -> ProviderResult<Image> {
        let mut s = self.lock();
        s.mutate("create_image", &request.name)?;
        let image = Image {
            name: request.name.clone(),
            self_link: image_link("test-project", &request.name),
            family: None,
            description: request.description.clone(),
        };
        insert_new(&mut s.images, &request.name, image)
    }

    async fn destroy_image(&self, name: &str) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("destroy_image", name)?;
        remove(&mut s.images, name)
    }

    async fn get_address(&self, name: &str, _region: &str) -> ProviderResult<Lookup<Address>> {
        let mut s = self.lock();
        let result = s.read("get_address", name).and_then(|()| fetch(&s.addresses, name));
        Lookup::from_result(result)
    }

    async fn create_address(
        &self,
        name: &str,
        region: &str,
        address: Option<&str>,
    ) -> ProviderResult<Address> {
        let mut s = self.lock();
        s.mutate("create_address", name)?;
        let next = format!("203.0.113.{}", s.addresses.len() + 10);
        let address = Address {
            name: name.to_string(),
            region: region.to_string(),
            address: address.map_or(next, String::from),
        };
        insert_new(&mut s.addresses, name, address)
    }

    async fn destroy_address(&self, name: &str, _region: &str) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("destroy_address", name)?;
        remove(&mut s.addresses, name)
    }

    async fn get_forwarding_rule(
        &self,
        name: &str,
        _region: &str,
    ) -> ProviderResult<Lookup<ForwardingRule>> {
        let mut s = self.lock();
        let result = s
            .read("get_forwarding_rule", name)
            .and_then(|()| fetch(&s.forwarding_rules, name));
        Lookup::from_result(result)
    }

    async fn create_forwarding_rule(
        &self,
        rule: &ForwardingRule,
    ) -> ProviderResult<ForwardingRule> {
        let mut s = self.lock();
        s.mutate("create_forwarding_rule", &rule.name)?;
        let mut rule = rule.clone();
        if rule.address.is_none() {
            rule.address = Some(String::from("198.51.100.7"));
        }
        let name = rule.name.clone();
        insert_new(&mut s.forwarding_rules, &name, rule)
    }

    async fn set_forwarding_rule_target(
        &self,
        name: &str,
        _region: &str,
        target_pool: &str,
    ) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("set_forwarding_rule_target", name)?;
        let rule = s.forwarding_rules.get_mut(name).ok_or_else(|| not_found(name))?;
        rule.target_pool = target_pool.to_string();
        Ok(())
    }

    async fn destroy_forwarding_rule(&self, name: &str, _region: &str) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("destroy_forwarding_rule", name)?;
        remove(&mut s.forwarding_rules, name)
    }

    async fn get_health_check(&self, name: &str) -> ProviderResult<Lookup<HttpHealthCheck>> {
        let mut s = self.lock();
        let result = s
            .read("get_health_check", name)
            .and_then(|()| fetch(&s.health_checks, name));
        Lookup::from_result(result)
    }

    async fn create_health_check(
        &self,
        check: &HttpHealthCheck,
    ) -> ProviderResult<HttpHealthCheck> {
        let mut s = self.lock();
        s.mutate("create_health_check", &check.name)?;
        insert_new(&mut s.health_checks, &check.name, check.clone())
    }

    async fn update_health_check(
        &self,
        check: &HttpHealthCheck,
    ) -> ProviderResult<HttpHealthCheck> {
        let mut s = self.lock();
        s.mutate("update_health_check", &check.name)?;
        let slot = s
            .health_checks
            .get_mut(&check.name)
            .ok_or_else(|| not_found(&check.name))?;
        *slot = check.clone();
        Ok(check.clone())
    }

    async fn destroy_health_check(&self, name: &str) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("destroy_health_check", name)?;
        remove(&mut s.health_checks, name)
    }

    async fn get_target_pool(
        &self,
        name: &str,
        _region: &str,
    ) -> ProviderResult<Lookup<TargetPool>> {
        let mut s = self.lock();
        let result = s
            .read("get_target_pool", name)
            .and_then(|()| fetch(&s.target_pools, name));
        Lookup::from_result(result)
    }

    async fn create_target_pool(&self, name: &str, region: &str) -> ProviderResult<TargetPool> {
        let mut s = self.lock();
        s.mutate("create_target_pool", name)?;
        let pool = TargetPool {
            name: name.to_string(),
            region: region.to_string(),
            health_checks: Vec::new(),
            instances: Vec::new(),
        };
        insert_new(&mut s.target_pools, name, pool)
    }

    async fn add_target_pool_health_check(
        &self,
        pool: &str,
        _region: &str,
        check: &str,
    ) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("add_target_pool_health_check", check)?;
        let pool = s.target_pools.get_mut(pool).ok_or_else(|| not_found(pool))?;
        pool.health_checks.push(check.to_string());
        Ok(())
    }

    async fn remove_target_pool_health_check(
        &self,
        pool: &str,
        _region: &str,
        check: &str,
    ) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("remove_target_pool_health_check", check)?;
        let pool = s.target_pools.get_mut(pool).ok_or_else(|| not_found(pool))?;
        pool.health_checks.retain(|c| c != check);
        Ok(())
    }

    async fn add_target_pool_instance(
        &self,
        pool: &str,
        _region: &str,
        instance: &str,
    ) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("add_target_pool_instance", instance)?;
        let pool = s.target_pools.get_mut(pool).ok_or_else(|| not_found(pool))?;
        pool.instances.push(instance.to_string());
        Ok(())
    }

    async fn remove_target_pool_instance(
        &self,
        pool: &str,
        _region: &str,
        instance: &str,
    ) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("remove_target_pool_instance", instance)?;
        let pool = s.target_pools.get_mut(pool).ok_or_else(|| not_found(pool))?;
        pool.instances.retain(|i| i != instance);
        Ok(())
    }

    async fn destroy_target_pool(&self, name: &str, _region: &str) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("destroy_target_pool", name)?;
        remove(&mut s.target_pools, name)
    }

    async fn get_route(&self, name: &str) -> ProviderResult<Lookup<Route>> {
        let mut s = self.lock();
        let result = s.read("get_route", name).and_then(|()| fetch(&s.routes, name));
        Lookup::from_result(result)
    }

    async fn create_route(&self, route: &Route) -> ProviderResult<Route> {
        let mut s = self.lock();
        s.mutate("create_route", &route.name)?;
        insert_new(&mut s.routes, &route.name, route.clone())
    }

    async fn destroy_route(&self, name: &str) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("destroy_route", name)?;
        remove(&mut s.routes, name)
    }
}

#[async_trait]
impl StorageApi for FakeCloud {
    async fn get_bucket(&self, name: &str) -> ProviderResult<Lookup<Bucket>> {
        let mut s = self.lock();
        let result = s.read("get_bucket", name).and_then(|()| fetch(&s.buckets, name));
        Lookup::from_result(result)
    }

    async fn create_bucket(&self, _project: &str, bucket: &Bucket) -> ProviderResult<Bucket> {
        let mut s = self.lock();
        s.mutate("create_bucket", &bucket.name)?;
        insert_new(&mut s.buckets, &bucket.name, bucket.clone())
    }

    async fn patch_bucket(&self, bucket: &Bucket) -> ProviderResult<Bucket> {
        let mut s = self.lock();
        s.mutate("patch_bucket", &bucket.name)?;
        let slot = s
            .buckets
            .get_mut(&bucket.name)
            .ok_or_else(|| not_found(&bucket.name))?;
        *slot = bucket.clone();
        Ok(bucket.clone())
    }

    async fn delete_bucket(&self, name: &str) -> ProviderResult<()> {
        let mut s = self.lock();
        s.mutate("delete_bucket", name)?;
        remove(&mut s.buckets, name)
    }
}

/// A [`Connector`] that always hands out the same [`FakeCloud`].
#[derive(Debug)]
pub struct FakeConnector {
    pub cloud: Arc<FakeCloud>,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(cloud: Arc<FakeCloud>) -> Self {
        Self {
            cloud,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _credentials: &Credentials) -> ProviderResult<Arc<dyn CloudApi>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let api: Arc<dyn CloudApi> = self.cloud.clone();
        Ok(api)
    }
}
