use facet::Facet;

#[derive(Facet, Clone, Debug)]
struct Order {
    id: u64,
    total: f64,
    note: String,
}

#[derive(Facet, Clone, Debug, Default, PartialEq)]
struct OrderLine {
    id: u64,
    total: f64,
}

fn orders() -> Vec<Order> {
    vec![
        Order {
            id: 1,
            total: 9.5,
            note: "first".to_string(),
        },
        Order {
            id: 2,
            total: 20.0,
            note: "second".to_string(),
        },
        Order {
            id: 3,
            total: 0.75,
            note: "third".to_string(),
        },
    ]
}

#[test]
fn sequence_into_sequence_appends_in_order() {
    let mut lines = vec![OrderLine { id: 100, total: 1.0 }];
    facet_copy::copy(&mut lines, &orders()).unwrap();

    assert_eq!(
        lines,
        vec![
            OrderLine { id: 100, total: 1.0 },
            OrderLine { id: 1, total: 9.5 },
            OrderLine { id: 2, total: 20.0 },
            OrderLine { id: 3, total: 0.75 },
        ]
    );
}

#[test]
fn single_record_into_sequence_appends_one() {
    let mut lines: Vec<OrderLine> = Vec::new();
    facet_copy::copy(
        &mut lines,
        &Order {
            id: 42,
            total: 3.0,
            note: String::new(),
        },
    )
    .unwrap();

    assert_eq!(lines, vec![OrderLine { id: 42, total: 3.0 }]);
}

#[test]
fn empty_source_sequence_leaves_destination_alone() {
    let mut lines = vec![OrderLine { id: 5, total: 5.0 }];
    let empty: Vec<Order> = Vec::new();
    facet_copy::copy(&mut lines, &empty).unwrap();

    assert_eq!(lines, vec![OrderLine { id: 5, total: 5.0 }]);
}

#[test]
fn boxed_elements_are_allocated() {
    let mut lines: Vec<Box<OrderLine>> = Vec::new();
    facet_copy::copy(&mut lines, &orders()).unwrap();

    let ids: Vec<u64> = lines.iter().map(|line| line.id).collect();
    assert_eq!(ids, [1, 2, 3]);
}

#[test]
fn optional_elements_are_filled() {
    let mut lines: Vec<Option<OrderLine>> = Vec::new();
    facet_copy::copy(&mut lines, &orders()[..1].to_vec()).unwrap();

    assert_eq!(lines, vec![Some(OrderLine { id: 1, total: 9.5 })]);
}

#[test]
fn empty_source_elements_become_zero_values() {
    let source: Vec<Option<Order>> = vec![
        None,
        Some(Order {
            id: 8,
            total: 8.0,
            note: String::new(),
        }),
    ];
    let mut lines: Vec<OrderLine> = Vec::new();
    facet_copy::copy(&mut lines, &source).unwrap();

    assert_eq!(
        lines,
        vec![OrderLine::default(), OrderLine { id: 8, total: 8.0 }]
    );
}

#[test]
fn sequence_fields_are_mapped_element_by_element() {
    #[derive(Facet, Clone, Debug)]
    struct Invoice {
        number: String,
        orders: Vec<Order>,
    }

    #[derive(Facet, Clone, Debug, Default, PartialEq)]
    struct InvoiceView {
        number: String,
        orders: Vec<OrderLine>,
    }

    let invoice = Invoice {
        number: "INV-7".to_string(),
        orders: orders(),
    };
    let mut view = InvoiceView::default();
    facet_copy::copy(&mut view, &invoice).unwrap();

    assert_eq!(view.number, "INV-7");
    assert_eq!(view.orders.len(), 3);
    assert_eq!(view.orders[2], OrderLine { id: 3, total: 0.75 });
}

#[test]
fn record_into_scalar_sequence_does_nothing() {
    let mut numbers = vec![1u32, 2];
    facet_copy::copy(&mut numbers, &orders()).unwrap();
    assert_eq!(numbers, [1, 2]);
}

#[test]
fn array_source_is_expanded() {
    let source: [Order; 2] = [orders()[0].clone(), orders()[2].clone()];
    let mut lines: Vec<OrderLine> = Vec::new();
    facet_copy::copy(&mut lines, &source).unwrap();

    assert_eq!(
        lines,
        vec![
            OrderLine { id: 1, total: 9.5 },
            OrderLine { id: 3, total: 0.75 },
        ]
    );
}

#[test]
fn failing_element_aborts_the_whole_copy() {
    #[derive(Facet, Clone, Debug)]
    struct RawTicket {
        number: u32,
    }

    #[derive(Facet, Clone, Debug, PartialEq)]
    struct Ticket {
        number: Option<std::num::NonZero<u32>>,
    }

    let existing = Ticket {
        number: std::num::NonZero::new(9),
    };
    let mut tickets = vec![existing.clone()];
    let source = vec![
        RawTicket { number: 1 },
        RawTicket { number: 0 },
        RawTicket { number: 3 },
    ];
    let err = facet_copy::copy(&mut tickets, &source).unwrap_err();

    assert!(
        matches!(err.kind(), facet_copy::CopyErrorKind::Decode { .. }),
        "{err}"
    );
    assert_eq!(tickets, vec![existing]);
}
