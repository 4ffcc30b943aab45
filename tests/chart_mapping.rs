use shoptrack::models::PurchaseRecord;
use shoptrack::viz::{ChartOutcome, CoordMapper, DEFAULT_VIEWPORT, Viewport, map_price_chart};

fn rec(price: f64, date: &str) -> PurchaseRecord {
    PurchaseRecord {
        id: format!("{date}-{price}"),
        name: "Coffee Beans".into(),
        price,
        store: "Cold Storage".into(),
        date: date.parse().unwrap(),
        image_url: None,
    }
}

fn chart(records: &[PurchaseRecord]) -> shoptrack::viz::PriceChart {
    match map_price_chart(records, DEFAULT_VIEWPORT) {
        ChartOutcome::Chart(c) => c,
        other => panic!("expected a chart, got {other:?}"),
    }
}

#[test]
fn equal_prices_share_y_and_equal_dates_share_x() {
    let records = vec![
        rec(12.0, "2024-01-01T00:00:00Z"),
        rec(15.0, "2024-01-01T00:00:00Z"),
        rec(12.0, "2024-02-01T00:00:00Z"),
        rec(9.5, "2024-03-01T00:00:00Z"),
    ];
    let c = chart(&records);
    assert_eq!(c.points.len(), records.len());
    assert_eq!(c.points[0].y, c.points[2].y);
    assert_eq!(c.points[0].x, c.points[1].x);
}

#[test]
fn x_is_monotonic_in_date() {
    let records: Vec<PurchaseRecord> = (1..=9)
        .map(|d| rec(10.0 + (d % 3) as f64, &format!("2024-06-{d:02}T08:30:00Z")))
        .collect();
    let c = chart(&records);
    assert!(c.points.windows(2).all(|w| w[0].x <= w[1].x));
    let pad = DEFAULT_VIEWPORT.padding as f64;
    assert_eq!(c.points[0].x, pad);
    assert_eq!(c.points[8].x, DEFAULT_VIEWPORT.width as f64 - pad);
}

#[test]
fn flat_prices_do_not_divide_by_zero() {
    let records = vec![
        rec(4.2, "2024-01-01T00:00:00Z"),
        rec(4.2, "2024-01-08T00:00:00Z"),
        rec(4.2, "2024-01-15T00:00:00Z"),
    ];
    let c = chart(&records);
    assert!(c.points.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    // flat series sit on the bottom edge of the plot area
    let bottom = (DEFAULT_VIEWPORT.height - DEFAULT_VIEWPORT.padding) as f64;
    assert!(c.points.iter().all(|p| p.y == bottom));
    assert_eq!(c.price_labels.len(), 1);
    assert_eq!(c.price_labels[0].price, 4.2);
}

#[test]
fn same_instant_does_not_divide_by_zero() {
    let mapper = CoordMapper::from_records(
        &[rec(1.0, "2024-01-01T00:00:00Z"), rec(3.0, "2024-01-01T00:00:00Z")],
        DEFAULT_VIEWPORT,
    )
    .unwrap();
    let x = mapper.x("2024-01-01T00:00:00Z".parse().unwrap());
    assert_eq!(x, DEFAULT_VIEWPORT.padding as f64);
}

#[test]
fn price_labels_are_capped_and_span_the_range() {
    let two = chart(&[rec(1.0, "2024-01-01T00:00:00Z"), rec(2.0, "2024-01-02T00:00:00Z")]);
    assert_eq!(two.price_labels.len(), 2);

    let many: Vec<PurchaseRecord> = (1..=8)
        .map(|d| rec(d as f64, &format!("2024-01-{d:02}T00:00:00Z")))
        .collect();
    let c = chart(&many);
    assert_eq!(c.price_labels.len(), 4);
    assert_eq!(c.price_labels.first().unwrap().price, 1.0);
    assert!((c.price_labels.last().unwrap().price - 8.0).abs() < 1e-9);
    assert!(c.price_labels.windows(2).all(|w| w[0].y > w[1].y));
}

#[test]
fn date_labels_use_first_and_last_dates() {
    let c = chart(&[rec(3.0, "2024-01-05T10:00:00Z"), rec(4.0, "2024-03-17T10:00:00Z")]);
    assert_eq!(c.start_label.text, "Jan 5");
    assert_eq!(c.end_label.text, "Mar 17");
    assert!(c.start_label.x < c.end_label.x);
}

#[test]
fn fewer_than_two_records_is_not_a_chart() {
    assert_eq!(
        map_price_chart(&[], DEFAULT_VIEWPORT),
        ChartOutcome::InsufficientData { count: 0 }
    );
    let one = map_price_chart(&[rec(2.0, "2024-01-01T00:00:00Z")], DEFAULT_VIEWPORT);
    assert_eq!(one, ChartOutcome::InsufficientData { count: 1 });
    assert!(one.chart().is_none());
}

#[test]
fn custom_viewport_is_respected() {
    let vp = Viewport {
        width: 800,
        height: 400,
        padding: 20,
    };
    let outcome = map_price_chart(
        &[rec(1.0, "2024-01-01T00:00:00Z"), rec(2.0, "2024-01-02T00:00:00Z")],
        vp,
    );
    let c = outcome.chart().unwrap();
    assert_eq!(c.points[0].x, 20.0);
    assert_eq!(c.points[0].y, 380.0);
    assert_eq!(c.points[1].x, 780.0);
    assert_eq!(c.points[1].y, 20.0);
}

#[test]
fn unusable_viewport_is_reported_not_mapped() {
    let records = [rec(1.0, "2024-01-01T00:00:00Z"), rec(2.0, "2024-01-02T00:00:00Z")];
    for vp in [
        Viewport { width: 80, height: 200, padding: 40 },
        Viewport { width: 450, height: 200, padding: 2_147_483_648 },
        Viewport { width: 450, height: 200, padding: u32::MAX },
    ] {
        assert!(!vp.is_valid());
        assert_eq!(vp.inner_width(), 0);
        assert_eq!(map_price_chart(&records, vp), ChartOutcome::InvalidViewport(vp));
    }
    assert_eq!(DEFAULT_VIEWPORT.inner_width(), 370);
}
