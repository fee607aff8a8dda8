use crate::browser::ImageElement;

/// Rank laid-out images by rendered area, largest first.
///
/// Images without a box or with zero area are dropped. The sort is stable,
/// so equal areas keep document order.
pub fn rank_by_area(images: &[ImageElement]) -> Vec<&ImageElement> {
    let mut ranked: Vec<(&ImageElement, f64)> = images
        .iter()
        .filter_map(|img| {
            let area = img.bounding_box?.area();
            (area > 0.0).then_some((img, area))
        })
        .collect();
    ranked.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    ranked.into_iter().map(|(img, _)| img).collect()
}

/// The image most likely to be the artwork: the largest rendered one.
pub fn largest_image(images: &[ImageElement]) -> Option<&ImageElement> {
    rank_by_area(images).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BoundingBox;

    fn img(index: usize, size: Option<(f64, f64)>) -> ImageElement {
        ImageElement {
            index,
            attributes: vec![("src".into(), format!("/{index}.jpg"))],
            bounding_box: size.map(|(width, height)| BoundingBox {
                x: 0.0,
                y: 0.0,
                width,
                height,
            }),
        }
    }

    #[test]
    fn test_largest_area_wins() {
        let images = vec![
            img(0, Some((100.0, 50.0))),
            img(1, Some((300.0, 400.0))),
            img(2, Some((1000.0, 20.0))),
        ];
        assert_eq!(largest_image(&images).unwrap().index, 1);
    }

    #[test]
    fn test_ties_keep_document_order() {
        let images = vec![
            img(0, Some((10.0, 10.0))),
            img(1, Some((200.0, 100.0))),
            img(2, Some((100.0, 200.0))),
        ];
        let order: Vec<usize> = rank_by_area(&images).iter().map(|i| i.index).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_unlaid_and_zero_area_are_skipped() {
        let images = vec![img(0, None), img(1, Some((0.0, 500.0)))];
        assert!(largest_image(&images).is_none());
        assert!(largest_image(&[]).is_none());
    }
}
