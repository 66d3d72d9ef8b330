use super::store::{parse_entry_id, public_to_stored, stored_relative};
use super::{CatalogStore, Entry, Product, ProductPatch};
use crate::ingest::entry_directory_name;
use crate::paths::{self, AssetNamespace};
use crate::scanner::ScannedEntry;

const SCAN_CATEGORY: &str = "Кирпич облицовочный";
const SCAN_SHORT: &str = "Керамический кирпич. Цена и наличие — уточняйте по телефону.";
const SCAN_DESCRIPTION: &str = "Облицовочный керамический кирпич. Подходит для фасадов, заборов и интерьерных решений. Уточняйте наличие, цену и доставку по телефону.";
const PRICE_ON_REQUEST: &str = "Уточняйте по телефону";

/// URL-safe identifier from a product title. Latin and Cyrillic letters and
/// digits survive, whitespace becomes `-`, everything else is dropped.
pub fn slugify(title: &str) -> String {
    let filtered: String = title
        .to_lowercase()
        .replace('ё', "е")
        .chars()
        .filter(|c| {
            c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || ('а'..='я').contains(c)
                || c.is_whitespace()
                || *c == '-'
        })
        .collect();

    let mut slug = String::with_capacity(filtered.len());
    for word in filtered.split_whitespace() {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(word);
    }

    let mut collapsed = String::with_capacity(slug.len());
    for c in slug.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}

impl Entry for Product {
    type Patch = ProductPatch;

    const NAMESPACE: AssetNamespace = AssetNamespace::Catalog;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn from_scan(id: u64, scanned: ScannedEntry) -> Self {
        let title = scanned.name;
        Self {
            id,
            slug: slugify(&title),
            category: SCAN_CATEGORY.to_string(),
            short: SCAN_SHORT.to_string(),
            description: SCAN_DESCRIPTION.to_string(),
            image: scanned.images.first().cloned().unwrap_or_default(),
            gallery: scanned.images,
            specs: vec![
                ("Наименование".to_string(), title.clone()),
                ("Цена".to_string(), PRICE_ON_REQUEST.to_string()),
            ],
            unit: "шт.".to_string(),
            availability: "В наличии".to_string(),
            title,
            ..Self::default()
        }
    }

    fn image_references(&self) -> Vec<String> {
        if self.gallery.is_empty() && !self.image.trim().is_empty() {
            vec![self.image.clone()]
        } else {
            self.gallery.clone()
        }
    }

    fn images_mut(&mut self) -> &mut Vec<String> {
        &mut self.gallery
    }

    fn images_added(&mut self) {
        if self.image.trim().is_empty()
            && let Some(first) = self.gallery.first()
        {
            self.image = first.clone();
        }
    }

    fn images_removed(&mut self) {
        match self.gallery.first() {
            Some(first) => self.image = first.clone(),
            None if paths::is_external(&self.image) => {}
            None => self.image.clear(),
        }
    }

    fn into_public(self, urls: Vec<String>) -> Self {
        let image = match urls.first() {
            Some(first) => first.clone(),
            None if paths::is_external(&self.image) => self.image.clone(),
            None => String::new(),
        };
        Self {
            image,
            gallery: urls,
            ..self
        }
    }

    fn into_stored(self) -> Self {
        let gallery: Vec<String> = self
            .gallery
            .iter()
            .map(|url| public_to_stored(url, Self::NAMESPACE))
            .collect();
        let image = match public_to_stored(&self.image, Self::NAMESPACE) {
            image if image.is_empty() => gallery.first().cloned().unwrap_or_default(),
            image => image,
        };
        let slug = if self.slug.trim().is_empty() {
            slugify(&self.title)
        } else {
            self.slug.trim().to_string()
        };

        Self {
            slug,
            image,
            gallery,
            ..self
        }
    }

    fn apply_patch(&mut self, patch: ProductPatch) {
        if let Some(title) = patch.title
            && !title.trim().is_empty()
        {
            self.title = title.trim().to_string();
        }
        if let Some(category) = patch.category
            && !category.trim().is_empty()
        {
            self.category = category.trim().to_string();
        }
        if let Some(short) = patch.short {
            self.short = short.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(price_from) = patch.price_from {
            self.price_from = price_from;
        }
        if let Some(price_rub) = patch.price_rub {
            self.price_rub = price_rub;
        }
        if let Some(unit) = patch.unit {
            self.unit = unit;
        }
        if let Some(availability) = patch.availability {
            self.availability = availability;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(format) = patch.format {
            self.format = format;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(specs) = patch.specs {
            self.specs = specs;
        }
        if let Some(is_featured) = patch.is_featured {
            self.is_featured = is_featured;
        }
        if let Some(is_bestseller) = patch.is_bestseller {
            self.is_bestseller = is_bestseller;
        }
        if let Some(image) = patch.image {
            self.image = public_to_stored(&image, Self::NAMESPACE);
        }
        if let Some(gallery) = patch.gallery {
            self.gallery = gallery
                .iter()
                .map(|url| public_to_stored(url, Self::NAMESPACE))
                .collect();
            self.images_added();
        }
    }
}

impl CatalogStore {
    pub async fn find_by_slug(&self, slug: &str) -> Option<Product> {
        self.get()
            .await
            .into_iter()
            .find(|product| product.slug == slug)
    }

    /// Top-level directory holding a product's first image.
    pub async fn product_folder(&self, id: &str) -> Option<String> {
        let id = parse_entry_id(id)?;
        let product = self
            .load_raw()
            .await
            .into_iter()
            .find(|product| product.id == id)?;

        let first = if product.image.trim().is_empty() {
            product.gallery.first()?.clone()
        } else {
            product.image.clone()
        };
        if paths::is_external(&first) {
            return None;
        }

        stored_relative(&first, <Product as Entry>::NAMESPACE)
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
    }

    /// Directory uploads for a product land in: its existing image folder, or
    /// one named after the product when it has no images yet.
    pub async fn product_directory(&self, id: &str) -> Option<String> {
        if let Some(folder) = self.product_folder(id).await {
            return Some(folder);
        }
        let id = parse_entry_id(id)?;
        self.load_raw()
            .await
            .into_iter()
            .find(|product| product.id == id)
            .map(|product| entry_directory_name(&product.title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Кирпич Красный  Гладкий"), "кирпич-красный-гладкий");
        assert_eq!(slugify("Ёлка -- 250x120"), "елка-250x120");
        assert_eq!(slugify("  «Баварская» кладка!  "), "баварская-кладка");
        assert_eq!(slugify("Brick_RED 1.4NF"), "brickred-14nf");
    }

    #[test]
    fn test_from_scan_defaults() {
        let product = Product::from_scan(
            3,
            ScannedEntry {
                name: "Терракот".to_string(),
                images: vec!["Терракот/1.webp".to_string(), "Терракот/2.webp".to_string()],
            },
        );
        assert_eq!(product.id, 3);
        assert_eq!(product.slug, "терракот");
        assert_eq!(product.image, "Терракот/1.webp");
        assert_eq!(product.gallery.len(), 2);
        assert_eq!(product.specs[0], ("Наименование".to_string(), "Терракот".to_string()));
        assert_eq!(product.unit, "шт.");
        assert!(product.price_from.is_none());
    }

    #[test]
    fn test_remove_keeps_external_primary_image() {
        let mut product = Product {
            image: "https://cdn.example.com/brick.jpg".to_string(),
            ..Product::default()
        };
        product.images_removed();
        assert_eq!(product.image, "https://cdn.example.com/brick.jpg");

        let mut product = Product {
            image: "Терракот/1.webp".to_string(),
            ..Product::default()
        };
        product.images_removed();
        assert!(product.image.is_empty());
    }

    #[test]
    fn test_specs_serialize_as_pairs() {
        let product = Product {
            specs: vec![("Цвет".to_string(), "красный".to_string())],
            ..Product::default()
        };
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["specs"], serde_json::json!([["Цвет", "красный"]]));
        assert!(json.get("priceFrom").is_some());
        assert!(json.get("isFeatured").is_some());
    }
}
