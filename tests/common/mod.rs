//! Заскриптованные SNMP-агенты в памяти для интеграционных тестов.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use routerscope::device::Device;
use routerscope::snmp::{
    ErrorStatus, ObjectId, ProtoError, Session, SnmpAdapter, SnmpValue, Transport, TransportError,
};

pub const IF_DESCR: &str = "1.3.6.1.2.1.2.2.1.2";
pub const IF_OPER_STATUS: &str = "1.3.6.1.2.1.2.2.1.8";
pub const IP_AD_ENT_IF_INDEX: &str = "1.3.6.1.2.1.4.20.1.2";
pub const IPV6_ADDR_PFX_LENGTH: &str = "1.3.6.1.2.1.55.1.8.1.2";
pub const SYS_OBJECT_ID: &str = "1.3.6.1.2.1.1.2.0";
pub const CISCO_CPU: &str = "1.3.6.1.4.1.9.2.1.57.0";

pub fn oid(s: &str) -> ObjectId {
    s.parse().unwrap()
}

/// Что агент делает для одного OID.
#[derive(Debug, Clone)]
pub enum Reply {
    Value(SnmpValue),
    Fail(ProtoError),
    /// Никогда не отвечает; запрос завершается таймаутом адаптера или отменой.
    Hang,
}

#[derive(Debug, Clone, Default)]
pub struct Agent {
    mib: BTreeMap<ObjectId, Reply>,
    refuse_connect: bool,
    silent: bool,
    delay: Option<Duration>,
}

pub struct Interface<'a> {
    pub index: u32,
    pub name: &'a str,
    pub status: i64,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl Agent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, id: &str, value: SnmpValue) -> Self {
        self.mib.insert(oid(id), Reply::Value(value));
        self
    }

    pub fn fail(mut self, id: &str, error: ProtoError) -> Self {
        self.mib.insert(oid(id), Reply::Fail(error));
        self
    }

    pub fn hang(mut self, id: &str) -> Self {
        self.mib.insert(oid(id), Reply::Hang);
        self
    }

    /// Ошибка создания сокета: транспорт не может открыть сессию.
    pub fn refusing() -> Self {
        Self {
            refuse_connect: true,
            ..Self::default()
        }
    }

    /// Сессии открываются, но ни на один запрос нет ответа.
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    /// Ответ на каждый запрос приходит через `delay`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn cisco() -> Self {
        Self::new().value(
            SYS_OBJECT_ID,
            SnmpValue::ObjectId(oid("1.3.6.1.4.1.9.1.122")),
        )
    }

    /// Добавляет строки таблиц для одного интерфейса.
    pub fn interface(mut self, iface: Interface<'_>) -> Self {
        let index = u64::from(iface.index);
        self.mib.insert(
            oid(IF_DESCR).child(index),
            Reply::Value(SnmpValue::OctetString(iface.name.as_bytes().to_vec())),
        );
        self.mib.insert(
            oid(IF_OPER_STATUS).child(index),
            Reply::Value(SnmpValue::Integer(iface.status)),
        );
        if let Some(v4) = iface.ipv4 {
            let mut row = oid(IP_AD_ENT_IF_INDEX).arcs().to_vec();
            row.extend(v4.octets().iter().map(|o| u64::from(*o)));
            self.mib.insert(
                ObjectId::new(row),
                Reply::Value(SnmpValue::Integer(i64::from(iface.index))),
            );
        }
        if let Some(v6) = iface.ipv6 {
            let mut row = oid(IPV6_ADDR_PFX_LENGTH).arcs().to_vec();
            row.push(index);
            row.extend(v6.octets().iter().map(|o| u64::from(*o)));
            self.mib
                .insert(ObjectId::new(row), Reply::Value(SnmpValue::Integer(64)));
        }
        self
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub gets: AtomicUsize,
    pub bulks: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn bulks(&self) -> usize {
        self.bulks.load(Ordering::SeqCst)
    }

    /// Максимум одновременно открытых сессий.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Транспорт поверх набора именованных агентов. Неизвестные устройства отказывают в соединении.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    agents: HashMap<String, Arc<Agent>>,
    counters: Arc<Counters>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(mut self, device: &str, agent: Agent) -> Self {
        self.agents.insert(device.to_string(), Arc::new(agent));
        self
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    type Session = FakeSession;

    async fn open(&self, device: &Device) -> Result<FakeSession, TransportError> {
        let agent = match self.agents.get(&device.name) {
            Some(agent) if !agent.refuse_connect => Arc::clone(agent),
            _ => return Err(TransportError::Connect(format!("{}: refused", device.target()))),
        };
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(active, Ordering::SeqCst);
        Ok(FakeSession {
            agent,
            counters: Arc::clone(&self.counters),
        })
    }
}

pub struct FakeSession {
    agent: Arc<Agent>,
    counters: Arc<Counters>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn get(&mut self, id: &ObjectId) -> Result<SnmpValue, ProtoError> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.agent.delay {
            tokio::time::sleep(delay).await;
        }
        if self.agent.silent {
            std::future::pending::<()>().await;
        }
        match self.agent.mib.get(id) {
            Some(Reply::Value(v)) => Ok(v.clone()),
            Some(Reply::Fail(e)) => Err(e.clone()),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(ProtoError::protocol(ErrorStatus::NoSuchInstance, 1)),
        }
    }

    async fn get_bulk(
        &mut self,
        id: &ObjectId,
        max_repetitions: u32,
    ) -> Result<Vec<(ObjectId, SnmpValue)>, ProtoError> {
        self.counters.bulks.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.agent.delay {
            tokio::time::sleep(delay).await;
        }
        if self.agent.silent {
            std::future::pending::<()>().await;
        }
        let mut rows = Vec::new();
        for (key, reply) in self
            .agent
            .mib
            .range((Bound::Excluded(id.clone()), Bound::Unbounded))
            .take(max_repetitions as usize)
        {
            match reply {
                Reply::Value(v) => rows.push((key.clone(), v.clone())),
                Reply::Fail(e) => return Err(e.clone()),
                Reply::Hang => std::future::pending::<()>().await,
            }
        }
        Ok(rows)
    }
}

pub fn device(name: &str) -> Device {
    Device::new(name, "192.0.2.1", "public")
}

pub fn adapter(transport: FakeTransport) -> Arc<SnmpAdapter<FakeTransport>> {
    Arc::new(
        SnmpAdapter::new(transport)
            .with_timeout(Duration::from_millis(200))
            .with_max_repetitions(4),
    )
}

/// R1 из лабораторной: у интерфейсов 1 и 3 есть все адреса, у интерфейса 2
/// нет IPv6.
pub fn lab_router() -> Agent {
    Agent::cisco()
        .interface(Interface {
            index: 1,
            name: "FastEthernet0/0",
            status: 1,
            ipv4: Some(Ipv4Addr::new(198, 51, 101, 1)),
            ipv6: Some("2001:db8:1::1".parse().unwrap()),
        })
        .interface(Interface {
            index: 2,
            name: "FastEthernet0/1",
            status: 1,
            ipv4: Some(Ipv4Addr::new(10, 0, 12, 1)),
            ipv6: None,
        })
        .interface(Interface {
            index: 3,
            name: "FastEthernet1/0",
            status: 2,
            ipv4: Some(Ipv4Addr::new(10, 0, 13, 1)),
            ipv6: Some("2001:db8:13::1".parse().unwrap()),
        })
}
