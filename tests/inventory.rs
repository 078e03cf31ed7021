//! Инвентаризация против заскриптованных агентов.

mod common;

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use common::{Agent, FakeTransport, Interface, adapter, device, lab_router};
use routerscope::collector::{
    Attribute, DropPolicy, InventoryResolver, LookupError, OperStatus, ProbeMode, ResolveError,
};
use routerscope::snmp::{ErrorStatus, ProtoError};

// =============================================================================
// Перебор индексов
// =============================================================================

#[tokio::test]
async fn test_lab_router_keeps_only_fully_resolved_interfaces() {
    let transport = FakeTransport::new().agent("R1", lab_router());
    let counters = transport.counters();
    let resolver = InventoryResolver::new(adapter(transport));

    let inventory = resolver
        .resolve(&device("R1"), 10, &CancellationToken::new())
        .await
        .unwrap();

    let indices: Vec<u32> = inventory.records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 3]);

    let first = &inventory.records[0];
    assert_eq!(first.name.as_deref(), Some("FastEthernet0/0"));
    assert_eq!(first.oper_status, OperStatus::Up);
    assert_eq!(first.ipv4, Some(Ipv4Addr::new(198, 51, 101, 1)));
    assert_eq!(first.ipv6, Some("2001:db8:1::1".parse().unwrap()));
    assert_eq!(inventory.records[1].oper_status, OperStatus::Down);

    // Индекс 2 это настоящая ошибка, 4..=9 просто не существуют.
    let failures: Vec<_> = inventory.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 2);
    assert_eq!(failures[0].attribute, Attribute::Ipv6);
    assert!(matches!(failures[0].error, LookupError::NotFound { .. }));
    assert_eq!(inventory.dropped.len(), 7);

    assert_eq!(counters.opens(), counters.closes());
}

#[tokio::test]
async fn test_probe_bound_is_exclusive() {
    let transport = FakeTransport::new().agent("R1", lab_router());
    let counters = transport.counters();
    let resolver = InventoryResolver::new(adapter(transport));

    let inventory = resolver
        .resolve(&device("R1"), 3, &CancellationToken::new())
        .await
        .unwrap();

    // Перебираются только 1 и 2; 3 существует, но вне диапазона.
    assert_eq!(inventory.records.len(), 1);
    assert_eq!(inventory.records[0].index, 1);
    assert!(inventory.dropped.iter().all(|d| d.index < 3));
    assert_eq!(counters.opens(), counters.closes());
}

#[tokio::test]
async fn test_every_emitted_record_is_complete() {
    let agent = lab_router()
        .fail(
            "1.3.6.1.2.1.2.2.1.8.3",
            ProtoError::protocol(ErrorStatus::GenErr, 1),
        )
        .interface(Interface {
            index: 4,
            name: "Loopback0",
            status: 1,
            ipv4: None,
            ipv6: Some("2001:db8:ff::1".parse().unwrap()),
        });
    let transport = FakeTransport::new().agent("R1", agent);
    let resolver = InventoryResolver::new(adapter(transport));

    let inventory = resolver
        .resolve(&device("R1"), 10, &CancellationToken::new())
        .await
        .unwrap();

    for record in &inventory.records {
        assert!(record.name.is_some());
        assert!(record.ipv4.is_some());
        assert!(record.ipv6.is_some());
    }
    let failed: Vec<(u32, Attribute)> = inventory
        .failures()
        .map(|d| (d.index, d.attribute))
        .collect();
    assert_eq!(
        failed,
        vec![
            (2, Attribute::Ipv6),
            (3, Attribute::OperStatus),
            (4, Attribute::Ipv4)
        ]
    );
}

#[tokio::test]
async fn test_lenient_policy_keeps_unaddressed_interfaces() {
    let transport = FakeTransport::new().agent("R1", lab_router());
    let resolver =
        InventoryResolver::new(adapter(transport)).with_policy(DropPolicy::Lenient);

    let inventory = resolver
        .resolve(&device("R1"), 10, &CancellationToken::new())
        .await
        .unwrap();

    let indices: Vec<u32> = inventory.records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(inventory.records[1].ipv6, None);
    assert_eq!(inventory.failures().count(), 0);
}

#[tokio::test]
async fn test_lenient_policy_still_drops_failed_lookups() {
    // Первая строка таблицы IPv4 с ошибкой, поэтому любой поиск IPv4 падает.
    let agent = lab_router().fail(
        "1.3.6.1.2.1.4.20.1.2.10.0.12.1",
        ProtoError::protocol(ErrorStatus::GenErr, 1),
    );
    let transport = FakeTransport::new().agent("R1", agent);
    let resolver =
        InventoryResolver::new(adapter(transport)).with_policy(DropPolicy::Lenient);

    let inventory = resolver
        .resolve(&device("R1"), 10, &CancellationToken::new())
        .await
        .unwrap();

    assert!(inventory.records.is_empty());
    let failed: Vec<u32> = inventory.failures().map(|d| d.index).collect();
    assert_eq!(failed, vec![1, 2, 3]);
    assert!(inventory
        .failures()
        .all(|d| d.attribute == Attribute::Ipv4 && matches!(d.error, LookupError::Proto(_))));
}

// =============================================================================
// Обход таблицы имён
// =============================================================================

#[tokio::test]
async fn test_name_walk_finds_sparse_indices() {
    let agent = lab_router().interface(Interface {
        index: 42,
        name: "Vlan42",
        status: 1,
        ipv4: Some(Ipv4Addr::new(10, 42, 0, 1)),
        ipv6: Some("2001:db8:42::1".parse().unwrap()),
    });
    let transport = FakeTransport::new().agent("R1", agent);
    let counters = transport.counters();
    let resolver = InventoryResolver::new(adapter(transport));

    let inventory = resolver
        .resolve_with(&device("R1"), ProbeMode::NameWalk, &CancellationToken::new())
        .await
        .unwrap();

    let indices: Vec<u32> = inventory.records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 3, 42]);
    // В этом режиме отсутствующие индексы не перебираются.
    assert_eq!(inventory.dropped.len(), 1);
    assert_eq!(counters.opens(), counters.closes());
}

#[tokio::test]
async fn test_name_walk_failure_fails_the_device() {
    let agent = Agent::cisco()
        .value("1.3.6.1.2.1.2.2.1.2.1", routerscope::snmp::SnmpValue::Integer(0))
        .fail(
            "1.3.6.1.2.1.2.2.1.2.2",
            ProtoError::protocol(ErrorStatus::TooBig, 0),
        );
    let transport = FakeTransport::new().agent("R1", agent);
    let resolver = InventoryResolver::new(adapter(transport));

    let err = resolver
        .resolve_with(&device("R1"), ProbeMode::NameWalk, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NameTable(ProtoError::Protocol { .. })));
}

// =============================================================================
// Ленивость и отмена
// =============================================================================

#[tokio::test]
async fn test_address_scan_stops_at_first_match() {
    let mut agent = Agent::cisco().interface(Interface {
        index: 1,
        name: "Gi0/0",
        status: 1,
        ipv4: Some(Ipv4Addr::new(10, 0, 0, 1)),
        ipv6: Some("2001:db8::1".parse().unwrap()),
    });
    // Длинный хвост адресов другого интерфейса.
    for host in 2..200u8 {
        agent = agent.value(
            &format!("1.3.6.1.2.1.4.20.1.2.10.0.1.{host}"),
            routerscope::snmp::SnmpValue::Integer(9),
        );
    }
    let transport = FakeTransport::new().agent("R1", agent);
    let counters = transport.counters();
    let resolver = InventoryResolver::new(adapter(transport));

    let inventory = resolver
        .resolve(&device("R1"), 2, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(inventory.records.len(), 1);

    // 10.0.0.1 идёт раньше хвоста: одна страница на IPv4, одна на IPv6.
    assert_eq!(counters.bulks(), 2);
    assert_eq!(counters.opens(), counters.closes());
}

#[tokio::test]
async fn test_cancellation_returns_no_partial_inventory() {
    let agent = lab_router().hang("1.3.6.1.2.1.2.2.1.8.3");
    let transport = FakeTransport::new().agent("R1", agent);
    let counters = transport.counters();
    let resolver = Arc::new(
        InventoryResolver::new(Arc::new(
            routerscope::snmp::SnmpAdapter::new(transport)
                .with_timeout(std::time::Duration::from_secs(3600)),
        )),
    );

    let cancel = CancellationToken::new();
    let task = {
        let resolver = Arc::clone(&resolver);
        let cancel = cancel.clone();
        tokio::spawn(async move { resolver.resolve(&device("R1"), 10, &cancel).await })
    };

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancel.cancel();

    let outcome = task.await.unwrap();
    assert_eq!(outcome, Err(ResolveError::Cancelled));
    assert_eq!(counters.opens(), counters.closes());
}
